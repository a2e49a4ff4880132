use serde::{Deserialize, Serialize};

/// Independent hints; several may be set at once.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImagePreferences {
    pub prefer_backdrop: bool,
    pub prefer_thumb: bool,
    pub prefer_banner: bool,
    pub prefer_logo: bool,
    /// Photos and other leaf items may be told not to borrow a parent's thumb.
    pub inherit_thumb: Option<bool>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl ImagePreferences {
    pub fn thumb() -> Self {
        Self {
            prefer_thumb: true,
            ..Default::default()
        }
    }

    pub fn backdrop() -> Self {
        Self {
            prefer_backdrop: true,
            ..Default::default()
        }
    }

    pub fn with_width(mut self, width: u32) -> Self {
        self.width = Some(width);
        self
    }

    pub(crate) fn inherits_thumb(&self) -> bool {
        self.inherit_thumb.unwrap_or(true)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImageType {
    Primary,
    Thumb,
    Backdrop,
    Banner,
    Logo,
}

impl ImageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Primary => "Primary",
            Self::Thumb => "Thumb",
            Self::Backdrop => "Backdrop",
            Self::Banner => "Banner",
            Self::Logo => "Logo",
        }
    }
}

/// Result of image resolution. All fields are `None` when the item has no
/// usable artwork; callers render a placeholder.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedImage {
    pub url: Option<String>,
    pub placeholder_hash: Option<String>,
    /// Item that owns the image; differs from the queried item when inherited.
    pub item_id: Option<String>,
    pub image_type: Option<ImageType>,
}

impl ResolvedImage {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_none(&self) -> bool {
        self.url.is_none()
    }
}
