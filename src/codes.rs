use std::collections::BTreeMap;

use rand::Rng;

pub fn generate_code(rng: &mut impl Rng) -> String {
    format!("{:06}", rng.gen_range(0..1_000_000u32))
}

/// One six-digit secret per invited supplier, unique within the project.
pub fn issue_codes<I, S>(suppliers: I) -> BTreeMap<String, String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut rng = rand::thread_rng();
    let mut codes: BTreeMap<String, String> = BTreeMap::new();
    for supplier in suppliers {
        let code = loop {
            let candidate = generate_code(&mut rng);
            if !codes.values().any(|c| *c == candidate) {
                break candidate;
            }
        };
        codes.insert(supplier.into(), code);
    }
    codes
}
