/// An image received with a product form, not yet stored anywhere
#[derive(Debug, Clone, PartialEq)]
pub struct UploadedImage {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl UploadedImage {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Parts without a content type are accepted; anything declared must be `image/*`
    pub fn is_image(&self) -> bool {
        self.content_type
            .as_deref()
            .map(|content_type| content_type.starts_with("image/"))
            .unwrap_or(true)
    }
}

/// Where an uploaded image ended up
#[derive(Debug, Clone, PartialEq)]
pub struct StoredAsset {
    /// Public URL clients use to fetch the image
    pub url: String,
    /// Identifier used to delete the asset later
    pub public_id: String,
}
