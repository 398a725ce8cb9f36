//! The generated module: what the host's bundle sees when it imports an
//! image.
//!
//! ```js
//! module.exports = {
//!   srcSet: __webpack_public_path__ + "a-500.jpg"+" 500w"+","+__webpack_public_path__ + "a-1000.jpg"+" 1000w",
//!   images: [{path: __webpack_public_path__ + "a-500.jpg",width: 500,height: 450},...],
//!   src: __webpack_public_path__ + "a-500.jpg",
//!   toString: function(){return __webpack_public_path__ + "a-500.jpg"},
//!   placeholder: "data:image/jpeg;base64,...",
//!   width: 500,
//!   height: 450
//! }
//! ```
//!
//! The default artifact (`src`, `width`, `height`) is the first one in plan
//! order.

use crate::imaging::Mime;
use crate::naming::{PublicReference, js_string};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// Module export convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportStyle {
    /// `module.exports = {...}`
    #[default]
    CommonJs,
    /// `export default {...}`
    EsModule,
}

impl ExportStyle {
    pub fn prefix(self) -> &'static str {
        match self {
            ExportStyle::CommonJs => "module.exports =",
            ExportStyle::EsModule => "export default",
        }
    }
}

/// One named, emitted output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// Output location handed to the emission sink.
    pub location: String,
    pub reference: PublicReference,
    pub width: u32,
    pub height: u32,
}

/// Artifacts plus the optional inline placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descriptor {
    images: Vec<Artifact>,
    placeholder: Option<String>,
}

impl Descriptor {
    /// Returns `None` when `images` is empty: a descriptor always has a
    /// default artifact.
    pub fn new(images: Vec<Artifact>, placeholder: Option<String>) -> Option<Self> {
        if images.is_empty() {
            return None;
        }
        Some(Self {
            images,
            placeholder,
        })
    }

    pub fn images(&self) -> &[Artifact] {
        &self.images
    }

    pub fn placeholder(&self) -> Option<&str> {
        self.placeholder.as_deref()
    }

    /// The default artifact.
    pub fn src(&self) -> &Artifact {
        &self.images[0]
    }

    /// Render the module text.
    pub fn to_module_source(&self, style: ExportStyle) -> String {
        let src_set = self
            .images
            .iter()
            .map(|a| {
                format!(
                    "{}+{}",
                    a.reference.to_expression(),
                    js_string(&format!(" {}w", a.width))
                )
            })
            .collect::<Vec<_>>()
            .join("+\",\"+");
        let images = self
            .images
            .iter()
            .map(|a| {
                format!(
                    "{{path: {},width: {},height: {}}}",
                    a.reference.to_expression(),
                    a.width,
                    a.height
                )
            })
            .collect::<Vec<_>>()
            .join(",");
        let src = self.src();
        let src_expr = src.reference.to_expression();

        let mut out = format!("{} {{\n", style.prefix());
        out.push_str(&format!("  srcSet: {src_set},\n"));
        out.push_str(&format!("  images: [{images}],\n"));
        out.push_str(&format!("  src: {src_expr},\n"));
        out.push_str(&format!("  toString: function(){{return {src_expr}}},\n"));
        if let Some(placeholder) = &self.placeholder {
            out.push_str(&format!("  placeholder: {},\n", js_string(placeholder)));
        }
        out.push_str(&format!("  width: {},\n", src.width));
        out.push_str(&format!("  height: {}\n", src.height));
        out.push('}');
        out
    }
}

/// `data:{mime};base64,{data}`
pub fn placeholder_data_uri(mime: Mime, data: &[u8]) -> String {
    format!("data:{};base64,{}", mime.as_str(), STANDARD.encode(data))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runtime(location: &str, width: u32, height: u32) -> Artifact {
        Artifact {
            location: location.into(),
            reference: PublicReference::Runtime {
                expression: "__webpack_public_path__".into(),
                location: location.into(),
            },
            width,
            height,
        }
    }

    fn two_images() -> Descriptor {
        Descriptor::new(
            vec![runtime("a-500.jpg", 500, 450), runtime("a-1000.jpg", 1000, 900)],
            None,
        )
        .unwrap()
    }

    #[test]
    fn empty_descriptor_is_rejected() {
        assert!(Descriptor::new(vec![], None).is_none());
    }

    #[test]
    fn first_artifact_is_default() {
        let d = two_images();
        assert_eq!(d.src().width, 500);
    }

    #[test]
    fn module_source_commonjs() {
        let text = two_images().to_module_source(ExportStyle::CommonJs);
        let expected = r#"module.exports = {
  srcSet: __webpack_public_path__ + "a-500.jpg"+" 500w"+","+__webpack_public_path__ + "a-1000.jpg"+" 1000w",
  images: [{path: __webpack_public_path__ + "a-500.jpg",width: 500,height: 450},{path: __webpack_public_path__ + "a-1000.jpg",width: 1000,height: 900}],
  src: __webpack_public_path__ + "a-500.jpg",
  toString: function(){return __webpack_public_path__ + "a-500.jpg"},
  width: 500,
  height: 450
}"#;
        assert_eq!(text, expected);
    }

    #[test]
    fn module_source_es_module_with_placeholder() {
        let d = Descriptor::new(
            vec![Artifact {
                location: "a.png".into(),
                reference: PublicReference::Literal("/img/a.png".into()),
                width: 10,
                height: 20,
            }],
            Some(placeholder_data_uri(Mime::Png, b"hi")),
        )
        .unwrap();
        let text = d.to_module_source(ExportStyle::EsModule);

        assert!(text.starts_with("export default {\n"));
        assert!(text.contains(r#"srcSet: "/img/a.png"+" 10w","#));
        assert!(text.contains(r#"placeholder: "data:image/png;base64,aGk=","#));
        assert!(text.ends_with("width: 10,\n  height: 20\n}"));
    }

    #[test]
    fn placeholder_uri_format() {
        assert_eq!(
            placeholder_data_uri(Mime::Jpeg, &[0xff, 0xd8]),
            "data:image/jpeg;base64,/9g="
        );
    }
}
