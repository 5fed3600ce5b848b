use async_trait::async_trait;

use super::{DocumentError, DocumentGenerator};
use crate::loan::Loan;

/// Addresses agreement letters under a static document host.
///
/// Rendering happens out of band; this gateway only hands out the stable
/// location the rendered PDF is published at.
#[derive(Clone)]
pub struct UrlAgreementGenerator {
    base_url: String,
}

impl UrlAgreementGenerator {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl DocumentGenerator for UrlAgreementGenerator {
    async fn generate_agreement(&self, loan: &Loan) -> Result<String, DocumentError> {
        if self.base_url.is_empty() {
            return Err(DocumentError::Rendering(
                "agreement base url is empty".to_string(),
            ));
        }
        Ok(format!("{}/agreements/{}.pdf", self.base_url, loan.id))
    }
}
