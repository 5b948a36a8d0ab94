use crate::error::Error;

pub trait QrRenderer {
    fn content_type(&self) -> &'static str;
    fn render(&self, url: &str) -> Result<Vec<u8>, Error>;
}
