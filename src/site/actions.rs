use std::sync::Arc;

use tracing::{debug, error, info};

use crate::app::{Result, WatchError};
use crate::domain::{Board, DeleteRequest, DeleteResponse, Reply, SiteFeature};
use crate::fetcher::{HttpResponse, HttpTransport, RequestSpec, TransportError};
use crate::site::common::generate_password;
use crate::site::SiteAdapter;

/// Apply the site's request modifier, execute, and treat non-2xx as failure.
pub async fn execute(
    transport: &dyn HttpTransport,
    site: &dyn SiteAdapter,
    mut request: RequestSpec,
) -> std::result::Result<HttpResponse, TransportError> {
    site.modify_request(&mut request);
    let response = transport.execute(request).await?;
    if !response.is_success() {
        return Err(TransportError::Status(response.status));
    }
    Ok(response)
}

/// A reply the site accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostedReply {
    pub post_no: u64,
    pub thread_no: u64,
    /// Password needed to delete the post later.
    pub password: String,
}

/// One-shot site operations: board enumeration, posting and deleting.
pub struct SiteActions {
    transport: Arc<dyn HttpTransport>,
}

impl SiteActions {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self { transport }
    }

    /// Boards the site lists right now, or its built-in list if that fails.
    ///
    /// Sites that cannot enumerate boards yield nothing.
    pub async fn boards(&self, site: &dyn SiteAdapter) -> Vec<Board> {
        if !site.boards_type().can_list() {
            return Vec::new();
        }

        match self.fetch_boards(site).await {
            Ok(boards) if !boards.is_empty() => {
                info!("Loaded {} boards for {}", boards.len(), site.name());
                boards
            }
            Ok(_) => {
                error!("{} listed no boards, using defaults", site.name());
                site.default_boards()
            }
            Err(e) => {
                error!("Failed to load boards for {}: {}", site.name(), e);
                site.default_boards()
            }
        }
    }

    async fn fetch_boards(&self, site: &dyn SiteAdapter) -> Result<Vec<Board>> {
        let Some(request) = site.build_boards_request()? else {
            return Ok(site.default_boards());
        };
        let response = execute(self.transport.as_ref(), site, request).await?;
        Ok(site.parse_boards(&response.body)?)
    }

    /// Submit a reply, generating a deletion password when none was given.
    pub async fn post(&self, site: &dyn SiteAdapter, reply: &mut Reply) -> Result<PostedReply> {
        if !site.feature(SiteFeature::Posting) {
            return Err(WatchError::UnsupportedFeature("posting".into()));
        }

        if site.post_requires_authentication() && !reply.has_captcha() {
            return Err(WatchError::AuthenticationRequired(site.post_authenticate()));
        }

        let password = match &reply.password {
            Some(password) => password.clone(),
            None => {
                let password = generate_password(reply);
                reply.password = Some(password.clone());
                password
            }
        };

        let request = site.build_post_request(reply)?;
        debug!("Posting to {}", reply.loadable);
        let response = execute(self.transport.as_ref(), site, request).await?;
        let result = site.parse_post_response(&response.body);

        if result.posted {
            let thread_no = match result.thread_no {
                0 if reply.loadable.is_thread() => reply.loadable.no,
                0 => result.post_no,
                no => no,
            };
            info!("Posted {} in thread {}", result.post_no, thread_no);
            return Ok(PostedReply {
                post_no: result.post_no,
                thread_no,
                password,
            });
        }

        if result.require_authentication {
            return Err(WatchError::AuthenticationRequired(site.post_authenticate()));
        }

        Err(WatchError::Validation {
            message: result
                .error_message
                .unwrap_or_else(|| "Unknown error".to_string()),
            probably_banned: result.probably_banned,
        })
    }

    pub async fn delete(
        &self,
        site: &dyn SiteAdapter,
        request: &DeleteRequest,
    ) -> Result<DeleteResponse> {
        let built = if site.feature(SiteFeature::PostDelete) {
            site.build_delete_request(request)?
        } else {
            None
        };
        let Some(http_request) = built else {
            return Err(WatchError::UnsupportedFeature("deleting posts".into()));
        };

        let response = execute(self.transport.as_ref(), site, http_request).await?;
        let result = site.parse_delete_response(&response.body);

        if !result.deleted {
            return Err(WatchError::Validation {
                message: result
                    .error_message
                    .unwrap_or_else(|| "Unknown error".to_string()),
                probably_banned: false,
            });
        }

        info!("Deleted post {} on /{}/", request.post_no, request.board_code);
        Ok(result)
    }
}
