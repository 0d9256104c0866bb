use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

/// Pastel colour per call-type code; unknown codes are lavender.
pub fn color_for_call_type(code: &str) -> Rgb {
    match code {
        "246" => Rgb::new(255, 182, 193), // shooting: light pink
        "917" => Rgb::new(255, 218, 185), // shots fired: peach
        "219" => Rgb::new(255, 255, 224), // robbery: light yellow
        "415" => Rgb::new(204, 255, 204), // disturbing the peace: mint
        "602" => Rgb::new(173, 216, 230), // trespassing: light blue
        "915" => Rgb::new(221, 160, 221), // suspicious person: plum
        _ => Rgb::new(230, 230, 250),
    }
}

/// Display labels keyed by call-type code, rebuilt on every ingest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CallTypeCatalog {
    labels: BTreeMap<String, String>,
}

impl CallTypeCatalog {
    pub fn insert(&mut self, code: &str, label: &str) {
        self.labels
            .entry(code.to_string())
            .or_insert_with(|| label.to_string());
    }

    /// Label for `code`, or the code itself when never seen.
    pub fn label<'a>(&'a self, code: &'a str) -> &'a str {
        self.labels.get(code).map(String::as_str).unwrap_or(code)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn clear(&mut self) {
        self.labels.clear();
    }
}
