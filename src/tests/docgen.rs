use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::docgen::{
    collect_image_urls, fetch_images, render, DocRequest, ImageFetcher, ImageSet, RenderError,
};

/// The smallest valid PNG (1x1 transparent).
const TINY_PNG: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
    0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F,
    0x15, 0xC4, 0x89, 0x00, 0x00, 0x00, 0x0A, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0x00,
    0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, 0x49,
    0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
];

const SAMPLE_MARKDOWN: &str = "\
# Quarterly report

Some **bold** and *italic* text, plus `inline code`.

## Items

* first
* second

1. one
2. two

| Supplier | Price |
| -------- | ----- |
| A        | 10    |

> a quoted line
";

fn doc(markdown: &str) -> DocRequest {
    DocRequest {
        markdown: markdown.to_owned(),
        background: None,
    }
}

#[test]
fn collects_image_urls_once_each() {
    let md = "![a](http://x/a.png) text ![b](http://x/b.png) again ![a](http://x/a.png)";
    assert_eq!(
        collect_image_urls(md),
        vec!["http://x/a.png".to_owned(), "http://x/b.png".to_owned()]
    );
    assert!(collect_image_urls("no images here").is_empty());
}

#[test]
fn renders_markdown_to_a_docx_zip() -> Result<()> {
    let bytes = render(&doc(SAMPLE_MARKDOWN), &ImageSet::new())?;
    assert!(bytes.starts_with(b"PK"));
    Ok(())
}

#[test]
fn missing_image_renders_instead_of_failing() -> Result<()> {
    let bytes = render(
        &doc("before ![chart](http://nowhere/chart.png) after"),
        &ImageSet::new(),
    )?;
    assert!(bytes.starts_with(b"PK"));
    Ok(())
}

#[test]
fn fetched_image_is_embedded() -> Result<()> {
    let mut images = ImageSet::new();
    images.insert("http://x/logo.png".to_owned(), TINY_PNG.to_vec());
    let bytes = render(&doc("![logo](http://x/logo.png)"), &images)?;
    assert!(bytes.starts_with(b"PK"));
    Ok(())
}

#[test]
fn background_image_is_accepted() -> Result<()> {
    let req = DocRequest {
        markdown: "# With letterhead".to_owned(),
        background: Some(TINY_PNG.to_vec()),
    };
    let bytes = render(&req, &ImageSet::new())?;
    assert!(bytes.starts_with(b"PK"));
    Ok(())
}

#[test]
fn non_image_background_is_rejected() {
    let req = DocRequest {
        markdown: "x".to_owned(),
        background: Some(b"definitely not a picture".to_vec()),
    };
    assert!(matches!(
        render(&req, &ImageSet::new()),
        Err(RenderError::Background(_))
    ));
}

struct FakeFetcher;

#[async_trait]
impl ImageFetcher for FakeFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        if url.ends_with("good.png") {
            Ok(TINY_PNG.to_vec())
        } else {
            bail!("connection refused")
        }
    }
}

#[test]
fn failed_fetches_are_left_out_of_the_set() -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread().build()?;
    let images = runtime.block_on(fetch_images(
        &FakeFetcher,
        "![ok](http://x/good.png) ![broken](http://x/bad.png)",
    ));
    assert!(images.contains_key("http://x/good.png"));
    assert!(!images.contains_key("http://x/bad.png"));
    Ok(())
}
