/// Page separator emitted by PDF text extraction
const FORM_FEED: char = '\x0C';

/// Extract the text of every page of an in-memory PDF
pub(super) fn extract_pages(bytes: &[u8]) -> Result<Vec<String>, String> {
    let text = pdf_extract::extract_text_from_mem(bytes)
        .map_err(|e| format!("PDF extraction failed: {e}"))?;
    Ok(split_pages(&text))
}

/// Split extracted text on form feeds. A trailing separator does not start
/// a new page.
#[inline]
pub fn split_pages(text: &str) -> Vec<String> {
    let text = text.strip_suffix(FORM_FEED).unwrap_or(text);
    text.split(FORM_FEED).map(str::to_string).collect()
}
