//! Helpers shared by site adapters.

use chrono::Utc;
use sha2::{Digest, Sha256};
use url::Url;

use crate::domain::Reply;
use crate::fetcher::FormBuilder;
use crate::normalizer::{html_to_text, leading_number};

const PROBABLY_BANNED_TEXT: &str = "banned";

/// `https://{host}/{segments..}`, each segment percent-encoded.
pub fn endpoint(host: &str, segments: &[&str]) -> Result<Url, url::ParseError> {
    let mut url = Url::parse(&format!("https://{}/", host))?;
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty().extend(segments);
    }
    Ok(url)
}

/// Whether a rejection message looks like a ban notice.
pub fn probably_banned(message: &str) -> bool {
    message.to_lowercase().contains(PROBABLY_BANNED_TEXT)
}

pub fn mentions_captcha(message: &str) -> bool {
    message.to_lowercase().contains("captcha")
}

/// Random-looking password used to delete a post later.
pub fn generate_password(reply: &Reply) -> String {
    let mut hasher = Sha256::new();
    hasher.update(reply.loadable.board_code.as_bytes());
    hasher.update(reply.loadable.no.to_le_bytes());
    hasher.update(reply.comment.as_bytes());
    hasher.update(
        Utc::now()
            .timestamp_nanos_opt()
            .unwrap_or_default()
            .to_le_bytes(),
    );
    let mut password = hex::encode(hasher.finalize());
    password.truncate(16);
    password
}

/// Name, email and, for new threads only, the subject.
pub fn add_author_fields(form: &mut FormBuilder, reply: &Reply, options: &str, subject_key: &str) {
    form.text("name", reply.name.clone());
    form.text("email", options);
    if reply.loadable.is_catalog() && !reply.subject.is_empty() {
        form.text(subject_key, reply.subject.clone());
    }
}

/// reCAPTCHA answer fields, for sites using the stock widget.
pub fn add_recaptcha_fields(form: &mut FormBuilder, reply: &Reply) {
    if let Some(response) = &reply.captcha_response {
        match &reply.captcha_challenge {
            Some(challenge) => {
                form.text("recaptcha_challenge_field", challenge.clone());
                form.text("recaptcha_response_field", response.clone());
            }
            None => {
                form.text("g-recaptcha-response", response.clone());
            }
        }
    }
}

pub fn add_file(form: &mut FormBuilder, reply: &Reply, field: &str) {
    if let Some(file) = &reply.file {
        form.file(field, &file.file_name, file.data.clone());
    }
}

/// Text between `start` and the next `end`.
pub fn extract_between<'a>(haystack: &'a str, start: &str, end: &str) -> Option<&'a str> {
    let from = haystack.find(start)? + start.len();
    let rest = &haystack[from..];
    let to = rest.find(end)?;
    Some(&rest[..to])
}

/// Plain text of an HTML error message.
pub fn message_text(html: &str) -> String {
    html_to_text(html).trim().to_string()
}

/// Post number in a `#p123` or `#123` fragment.
pub fn post_fragment(url: &Url) -> Option<u64> {
    url.fragment()
        .and_then(|f| leading_number(f.trim_start_matches('p')))
}

/// Non-empty path segments of a URL.
pub fn path_parts(url: &Url) -> Vec<&str> {
    url.path_segments()
        .map(|s| s.filter(|p| !p.is_empty()).collect())
        .unwrap_or_default()
}
