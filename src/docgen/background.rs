//! Full-page letterhead background: the picture rides in the section
//! header sized to a whole A4 page, the page margins and header/footer
//! distances collapse to zero so it bleeds to the edges, and the body
//! gets its margins back through paragraph indents.

use docx_rs::{Docx, Header, PageMargin, Paragraph, Pic, Run};

use super::RenderError;

// A4 in EMU (360000 per cm).
const A4_WIDTH_EMU: u32 = 7_560_000; // 21.0 cm
const A4_HEIGHT_EMU: u32 = 10_692_000; // 29.7 cm

/// Indent standing in for the zeroed page margins: 2.54 cm in twips.
pub const BODY_INDENT_TWIPS: i32 = 1440;

fn looks_like_image(bytes: &[u8]) -> bool {
    bytes.starts_with(&[0x89, b'P', b'N', b'G']) || bytes.starts_with(&[0xFF, 0xD8, 0xFF])
}

pub fn apply(docx: Docx, image: &[u8]) -> Result<Docx, RenderError> {
    if !looks_like_image(image) {
        return Err(RenderError::Background(
            "expected a PNG or JPEG".to_owned(),
        ));
    }

    let pic = Pic::new(image).size(A4_WIDTH_EMU, A4_HEIGHT_EMU);
    let header = Header::new().add_paragraph(Paragraph::new().add_run(Run::new().add_image(pic)));

    Ok(docx.header(header).page_margin(
        PageMargin::new()
            .top(0)
            .bottom(0)
            .left(0)
            .right(0)
            .header(0)
            .footer(0),
    ))
}
