use serde::{Deserialize, Serialize};

use crate::domain::Loadable;

#[derive(Debug, Clone, PartialEq)]
pub struct ReplyFile {
    pub file_name: String,
    pub data: Vec<u8>,
}

/// An outgoing post: a reply to a thread, or a new thread on a catalog loadable.
#[derive(Debug, Clone)]
pub struct Reply {
    pub loadable: Loadable,
    pub name: String,
    /// The email field; sites use it for options such as `sage`.
    pub options: String,
    pub subject: String,
    pub comment: String,
    pub file: Option<ReplyFile>,
    pub spoiler_image: bool,
    pub captcha_challenge: Option<String>,
    pub captcha_response: Option<String>,
    /// Password for deleting the post later. Generated when posting if unset.
    pub password: Option<String>,
}

impl Reply {
    pub fn new(loadable: Loadable, comment: &str) -> Self {
        Self {
            loadable,
            name: String::new(),
            options: String::new(),
            subject: String::new(),
            comment: comment.to_string(),
            file: None,
            spoiler_image: false,
            captcha_challenge: None,
            captcha_response: None,
            password: None,
        }
    }

    pub fn has_captcha(&self) -> bool {
        self.captcha_response.is_some()
    }
}

/// Interpretation of a site's answer to a post request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyResponse {
    pub posted: bool,
    pub post_no: u64,
    pub thread_no: u64,
    pub error_message: Option<String>,
    pub probably_banned: bool,
    pub require_authentication: bool,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteRequest {
    pub board_code: String,
    pub post_no: u64,
    pub password: String,
    pub image_only: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteResponse {
    pub deleted: bool,
    pub error_message: Option<String>,
}

/// Challenge a site requires before it accepts a post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SiteAuthentication {
    None,
    Captcha2 {
        site_key: String,
        base_url: String,
    },
    Captcha2NoJs {
        site_key: String,
        base_url: String,
    },
    NewCaptcha {
        base_url: String,
    },
    GenericWebView {
        url: String,
        retry_text: String,
        success_text: String,
    },
}

impl std::fmt::Display for SiteAuthentication {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SiteAuthentication::None => write!(f, "none"),
            SiteAuthentication::Captcha2 { base_url, .. } => {
                write!(f, "captcha v2 at {}", base_url)
            }
            SiteAuthentication::Captcha2NoJs { base_url, .. } => {
                write!(f, "captcha v2 (no javascript) at {}", base_url)
            }
            SiteAuthentication::NewCaptcha { base_url } => write!(f, "captcha at {}", base_url),
            SiteAuthentication::GenericWebView { url, .. } => write!(f, "web page at {}", url),
        }
    }
}
