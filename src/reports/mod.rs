//! Report renderers. They only format data that is already computed and
//! return complete documents as byte buffers.

pub mod excel;
pub mod pdf;

use derive_more::Display;

#[derive(Debug, Display)]
pub enum ReportError {
    #[display(fmt = "PDF rendering failed: {}", _0)]
    Pdf(String),
    #[display(fmt = "Excel rendering failed: {}", _0)]
    Excel(String),
}

impl std::error::Error for ReportError {}

impl From<rust_xlsxwriter::XlsxError> for ReportError {
    fn from(e: rust_xlsxwriter::XlsxError) -> Self {
        ReportError::Excel(e.to_string())
    }
}
