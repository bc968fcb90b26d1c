//! HTML emission: viewer template substitution.
//!
//! The viewer template is an opaque asset; this module only guarantees
//! that every placeholder is substituted, strings are escaped for
//! single-quoted JS literals, and the output is valid UTF-8.

use std::io::Cursor;
use std::path::Path;

use base64::Engine;
use tracing::info;

use crate::error::{ConvertError, Result};
use crate::types::{GroupLabel, ModelEntry};

const TEMPLATE: &str = include_str!("../assets/viewer.html");
const DLAS_LOGO_B64: &str = include_str!("../assets/dlas_logo.b64");

const PLACEHOLDERS: [&str; 5] = [
  "__JS_MODELS__",
  "__ANNOS_JSON__",
  "__JS_COLORMAP__",
  "__TOP_LOGO__",
  "__USER_LOGO__",
];

/// Escape a string for a single-quoted JS literal inside inline HTML.
/// `</` must break so embedded names cannot terminate the script tag.
fn escape_js(s: &str) -> String {
  let mut out = String::with_capacity(s.len());
  let mut prev_lt = false;
  for c in s.chars() {
    match c {
      '\\' => out.push_str("\\\\"),
      '\'' => out.push_str("\\'"),
      '\r' => out.push_str("\\r"),
      '\n' => out.push_str("\\n"),
      '/' if prev_lt => out.push_str("\\/"),
      c => out.push(c),
    }
    prev_lt = c == '<';
  }
  out
}

fn js_models(models: &[ModelEntry]) -> String {
  let mut out = String::from("[\n");
  for m in models {
    out.push_str(&format!(
      "  {{name:'{}',b64:'{}',group:'{}',displayName:'{}'}},\n",
      escape_js(&m.name),
      escape_js(&m.b64),
      m.group.as_str(),
      escape_js(&m.display_name),
    ));
  }
  out.push(']');
  out
}

fn js_colormap() -> String {
  let map: serde_json::Map<String, serde_json::Value> = GroupLabel::ALL
    .iter()
    .map(|g| (g.as_str().to_string(), serde_json::json!(g.color())))
    .collect();
  serde_json::Value::Object(map).to_string()
}

fn logo_img(b64: Option<&str>, alt: &str) -> String {
  match b64 {
    Some(data) => format!(r#"<img src="data:image/png;base64,{data}" alt="{alt}">"#),
    None => String::new(),
  }
}

/// Substitute the template and write the viewer document.
///
/// The first emission always writes an empty annotation array; the viewer
/// persists edits back into the file afterwards.
pub fn emit(
  out_path: &Path,
  models: &[ModelEntry],
  with_dlas_logo: bool,
  user_logo_b64: Option<&str>,
) -> Result<()> {
  let mut html = TEMPLATE.to_string();
  let substitutions = [
    ("__JS_MODELS__", js_models(models)),
    ("__ANNOS_JSON__", "[]".to_string()),
    ("__JS_COLORMAP__", js_colormap()),
    (
      "__TOP_LOGO__",
      logo_img(with_dlas_logo.then_some(DLAS_LOGO_B64.trim()), "DLAS"),
    ),
    ("__USER_LOGO__", logo_img(user_logo_b64, "logo")),
  ];

  for (placeholder, value) in &substitutions {
    if !html.contains(placeholder) {
      return Err(ConvertError::Template(placeholder.to_string()));
    }
    html = html.replace(placeholder, value);
  }

  std::fs::write(out_path, html.as_bytes()).map_err(|e| ConvertError::io(out_path, e))?;
  info!(out = %out_path.display(), models = models.len(), "wrote viewer html");
  Ok(())
}

/// Verify at load time that the embedded template still carries every
/// placeholder (used by tests and the CLI self-check).
pub fn template_placeholders_present() -> bool {
  PLACEHOLDERS.iter().all(|p| TEMPLATE.contains(p))
}

/// Load an image file and re-encode it as base64 PNG for embedding.
pub fn load_logo_b64(path: &Path) -> Result<String> {
  let img = image::ImageReader::open(path)
    .map_err(|e| ConvertError::io(path, e))?
    .decode()
    .map_err(|e| ConvertError::Logo {
      path: path.to_path_buf(),
      reason: format!("undecodable image: {e}"),
    })?;
  let mut png = Vec::new();
  img
    .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
    .map_err(|e| ConvertError::Logo {
      path: path.to_path_buf(),
      reason: format!("png encode: {e}"),
    })?;
  Ok(base64::engine::general_purpose::STANDARD.encode(png))
}

#[cfg(test)]
#[path = "html_test.rs"]
mod html_test;
