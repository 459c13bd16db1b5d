//! 2ch.hk: makaba JSON API. Boards cannot be listed, so they are created
//! on demand.

use serde::{Deserialize, Deserializer};
use url::Url;

use crate::domain::{
    Board, BoardFeature, BoardsType, DeleteRequest, DeleteResponse, Loadable, PostBuilder,
    PostImage, PostIndex, Reply, ReplyResponse, SiteAuthentication, SiteFeature, SiteId,
    SiteRecord,
};
use crate::fetcher::{FormBuilder, RequestSpec};
use crate::normalizer::{html_to_text, leading_number, CommentParser};
use crate::site::common::{self, endpoint};
use crate::site::{ParseError, ParsedBatch, SiteAdapter, SiteKind};

pub const NAME: &str = "2ch.hk";

const HOST: &str = "2ch.hk";
const HOSTS: [&str; 4] = ["2ch.hk", "www.2ch.hk", "2ch.pm", "www.2ch.pm"];

/// Site setting holding the reCAPTCHA site key used for posting.
pub const CAPTCHA_KEY_SETTING: &str = "captcha_key";

pub struct Dvach {
    id: SiteId,
    captcha_key: Option<String>,
    parser: CommentParser,
}

impl Dvach {
    pub fn new(record: &SiteRecord) -> Self {
        Self {
            id: record.id,
            captcha_key: record
                .setting(CAPTCHA_KEY_SETTING)
                .filter(|k| !k.is_empty())
                .map(str::to_string),
            parser: CommentParser::with_internal_domains(&HOSTS),
        }
    }

    fn builder(&self, board_code: &str, post: WirePost) -> PostBuilder {
        let mut builder = PostBuilder::new(board_code, post.num);
        builder.op = post.op == 0;
        builder.op_id = if builder.op { post.num } else { post.op };
        builder.name = html_to_text(&post.name);
        builder.tripcode = post.trip.filter(|t| !t.is_empty());
        builder.subject = post
            .subject
            .as_deref()
            .map(html_to_text)
            .filter(|s| !s.is_empty());
        builder.comment = post.comment;
        builder.unix_time = post.timestamp;
        builder.sticky = post.sticky == 1;
        builder.closed = post.closed == 1;
        builder.archived = post.archived == 1;
        builder.replies = post.posts_count.saturating_sub(1);
        builder.images = post.files_count;
        builder.last_modified = post.lasthit;
        builder.files = post.files.iter().filter_map(image).collect();
        builder
    }
}

fn image(file: &WireFile) -> Option<PostImage> {
    let path = file.path.as_deref()?;
    let name = file.name.as_deref()?;
    let (stem, extension) = name.rsplit_once('.').unwrap_or((name, ""));

    Some(PostImage {
        original_name: stem.to_string(),
        filename: html_to_text(stem),
        extension: extension.to_string(),
        image_url: format!("https://{}{}", HOST, path),
        thumbnail_url: file
            .thumbnail
            .as_deref()
            .map(|t| format!("https://{}{}", HOST, t))
            .unwrap_or_else(|| format!("https://{}{}", HOST, path)),
        spoiler_thumbnail_url: None,
        width: file.width,
        height: file.height,
        size: file.size,
        spoiler: false,
    })
}

/// makaba sends post numbers either as JSON numbers or as strings.
fn number<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Number {
        Int(u64),
        Text(String),
    }

    match Number::deserialize(deserializer)? {
        Number::Int(n) => Ok(n),
        Number::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

#[derive(Debug, Deserialize)]
struct ThreadResponse {
    #[serde(default)]
    threads: Vec<ThreadPosts>,
}

#[derive(Debug, Deserialize)]
struct ThreadPosts {
    #[serde(default)]
    posts: Vec<WirePost>,
}

#[derive(Debug, Deserialize)]
struct CatalogResponse {
    #[serde(default)]
    threads: Vec<WirePost>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WirePost {
    #[serde(deserialize_with = "number")]
    num: u64,
    #[serde(deserialize_with = "number")]
    op: u64,
    name: String,
    trip: Option<String>,
    subject: Option<String>,
    comment: String,
    timestamp: i64,
    sticky: u8,
    closed: u8,
    archived: u8,
    posts_count: u32,
    files_count: u32,
    lasthit: Option<i64>,
    files: Vec<WireFile>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireFile {
    path: Option<String>,
    name: Option<String>,
    size: u64,
    width: u32,
    height: u32,
    thumbnail: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PostResult {
    #[serde(rename = "Error")]
    error: Option<i64>,
    #[serde(rename = "Reason")]
    reason: Option<String>,
    #[serde(rename = "Status")]
    status: Option<String>,
    #[serde(rename = "Num")]
    num: Option<u64>,
    #[serde(rename = "Target")]
    target: Option<u64>,
}

impl SiteAdapter for Dvach {
    fn id(&self) -> SiteId {
        self.id
    }

    fn kind(&self) -> SiteKind {
        SiteKind::Dvach
    }

    fn name(&self) -> &str {
        NAME
    }

    fn boards_type(&self) -> BoardsType {
        BoardsType::Infinite
    }

    fn feature(&self, feature: SiteFeature) -> bool {
        matches!(feature, SiteFeature::Posting)
    }

    fn board_feature(&self, feature: BoardFeature, _board: &Board) -> bool {
        matches!(feature, BoardFeature::PostingImage)
    }

    fn comment_parser(&self) -> &CommentParser {
        &self.parser
    }

    fn build_fetch_request(&self, loadable: &Loadable) -> Result<RequestSpec, url::ParseError> {
        let url = if loadable.is_catalog() {
            endpoint(HOST, &[&loadable.board_code, "catalog.json"])?
        } else {
            let file = format!("{}.json", loadable.no);
            endpoint(HOST, &[&loadable.board_code, "res", &file])?
        };
        Ok(RequestSpec::get(url))
    }

    fn parse_response(
        &self,
        loadable: &Loadable,
        body: &[u8],
        previous: &PostIndex,
    ) -> Result<ParsedBatch, ParseError> {
        let mut batch = ParsedBatch::default();

        if loadable.is_thread() {
            let response: ThreadResponse = serde_json::from_slice(body)?;
            for post in response.threads.into_iter().flat_map(|t| t.posts) {
                if post.num == 0 {
                    return Err(ParseError::new("Post without a number"));
                }
                let builder = self.builder(&loadable.board_code, post);
                if builder.op {
                    batch.op = Some(builder.op_update());
                }
                batch.push(builder, previous);
            }
        } else {
            let response: CatalogResponse = serde_json::from_slice(body)?;
            for thread in response.threads {
                batch.push_fresh(self.builder(&loadable.board_code, thread));
            }
        }

        Ok(batch)
    }

    fn build_boards_request(&self) -> Result<Option<RequestSpec>, url::ParseError> {
        Ok(None)
    }

    fn parse_boards(&self, _body: &[u8]) -> Result<Vec<Board>, ParseError> {
        Ok(Vec::new())
    }

    fn build_post_request(&self, reply: &Reply) -> Result<RequestSpec, url::ParseError> {
        let mut url = endpoint(HOST, &["makaba", "posting.fcgi"])?;
        url.set_query(Some("json=1"));

        let mut form = FormBuilder::new();
        form.text("task", "post");
        form.text("board", reply.loadable.board_code.clone());
        form.text("comment", reply.comment.clone());
        form.text("thread", reply.loadable.no.to_string());
        common::add_author_fields(&mut form, reply, &reply.options, "subject");

        if reply.captcha_response.is_some() {
            form.text("captcha_type", "recaptcha");
            if let Some(key) = &self.captcha_key {
                form.text("captcha_key", key.clone());
            }
            common::add_recaptcha_fields(&mut form, reply);
        }

        common::add_file(&mut form, reply, "image");

        Ok(RequestSpec::post(url, form.build()))
    }

    fn parse_post_response(&self, body: &[u8]) -> ReplyResponse {
        let mut response = ReplyResponse::default();

        let result: PostResult = match serde_json::from_slice(body) {
            Ok(result) => result,
            Err(_) => {
                response.error_message = Some("Unexpected response from the server".to_string());
                return response;
            }
        };

        if result.error.is_some_and(|code| code != 0) {
            let message = common::message_text(result.reason.as_deref().unwrap_or_default());
            response.probably_banned = common::probably_banned(&message);
            response.require_authentication = common::mentions_captcha(&message);
            response.error_message = Some(message);
            return response;
        }

        response.posted = true;
        match result.status.as_deref() {
            Some("Redirect") => {
                let thread_no = result.target.unwrap_or_default();
                response.thread_no = thread_no;
                response.post_no = thread_no;
            }
            _ => {
                response.post_no = result.num.unwrap_or_default();
            }
        }
        response
    }

    fn post_requires_authentication(&self) -> bool {
        self.captcha_key.is_some()
    }

    fn post_authenticate(&self) -> SiteAuthentication {
        match &self.captcha_key {
            Some(key) => SiteAuthentication::Captcha2 {
                site_key: key.clone(),
                base_url: format!("https://{}", HOST),
            },
            None => SiteAuthentication::None,
        }
    }

    fn build_delete_request(
        &self,
        _request: &DeleteRequest,
    ) -> Result<Option<RequestSpec>, url::ParseError> {
        Ok(None)
    }

    fn parse_delete_response(&self, _body: &[u8]) -> DeleteResponse {
        DeleteResponse {
            deleted: false,
            error_message: Some(format!("{} does not support deleting posts", NAME)),
        }
    }

    fn matches(&self, url: &Url) -> bool {
        url.host_str()
            .is_some_and(|host| HOSTS.iter().any(|h| h.eq_ignore_ascii_case(host)))
    }

    fn resolve(&self, url: &Url) -> Option<Loadable> {
        if !self.matches(url) {
            return None;
        }

        let parts = common::path_parts(url);
        let board_code = *parts.first()?;

        match parts.get(1) {
            Some(&"res") => {
                let no = leading_number(parts.get(2)?).filter(|no| *no > 0)?;
                let mut loadable = Loadable::for_thread(self.id, board_code, no);
                loadable.marked_no = common::post_fragment(url);
                Some(loadable)
            }
            Some(page) if !page.ends_with(".html") => None,
            _ => Some(Loadable::for_catalog(self.id, board_code)),
        }
    }

    fn desktop_url(&self, loadable: &Loadable, post_no: Option<u64>) -> String {
        if loadable.is_catalog() {
            match post_no {
                Some(no) => format!("https://{}/{}/res/{}.html", HOST, loadable.board_code, no),
                None => format!("https://{}/{}/", HOST, loadable.board_code),
            }
        } else {
            let mut url = format!(
                "https://{}/{}/res/{}.html",
                HOST, loadable.board_code, loadable.no
            );
            if let Some(no) = post_no {
                url.push_str(&format!("#{}", no));
            }
            url
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ReplyFile;

    const THREAD_JSON: &str = r#"{
        "Board": "b",
        "threads": [{"posts": [
            {"num": "1000", "op": 0, "name": "Аноним", "subject": "Тред",
             "comment": "text", "timestamp": 1700000000, "sticky": 0, "closed": 1,
             "posts_count": 3, "files_count": 1, "lasthit": 1700000500,
             "files": [{"path": "/b/src/1000/1700.jpg", "name": "1700.jpg",
                        "size": 120, "width": 640, "height": 480,
                        "thumbnail": "/b/thumb/1000/1700s.jpg"}]},
            {"num": 1001, "op": 1000, "name": "Аноним",
             "comment": "<a href=\"/b/res/1000.html#1000\" class=\"post-reply-link\">&gt;&gt;1000</a>",
             "timestamp": 1700000100},
            {"num": "1002", "op": "1000", "name": "Аноним", "comment": "", "timestamp": 1700000200}
        ]}]
    }"#;

    const CATALOG_JSON: &str = r#"{"Board":"b","threads":[
        {"num":"1000","op":0,"comment":"first","posts_count":10},
        {"num":"2000","op":0,"comment":"second","posts_count":1}
    ]}"#;

    fn site() -> Dvach {
        let mut record = SiteRecord::new(SiteKind::Dvach.class_id());
        record.id = SiteId(2);
        Dvach::new(&record)
    }

    #[test]
    fn test_fetch_requests() {
        let site = site();
        let thread = site
            .build_fetch_request(&Loadable::for_thread(SiteId(2), "b", 1000))
            .unwrap();
        assert_eq!(thread.url.as_str(), "https://2ch.hk/b/res/1000.json");

        let catalog = site
            .build_fetch_request(&Loadable::for_catalog(SiteId(2), "b"))
            .unwrap();
        assert_eq!(catalog.url.as_str(), "https://2ch.hk/b/catalog.json");
    }

    #[test]
    fn test_parse_thread() {
        let site = site();
        let batch = site
            .parse_response(
                &Loadable::for_thread(SiteId(2), "b", 1000),
                THREAD_JSON.as_bytes(),
                &PostIndex::new(),
            )
            .unwrap();

        assert_eq!(batch.len(), 3);
        let op = &batch.posts[0].builder;
        assert!(op.op);
        assert_eq!(op.no, 1000);
        assert_eq!(op.subject.as_deref(), Some("Тред"));
        assert_eq!(op.files[0].image_url, "https://2ch.hk/b/src/1000/1700.jpg");
        assert_eq!(op.files[0].thumbnail_url, "https://2ch.hk/b/thumb/1000/1700s.jpg");
        assert_eq!(op.files[0].extension, "jpg");

        let reply = &batch.posts[1].builder;
        assert!(!reply.op);
        assert_eq!(reply.op_id, 1000);
        assert_eq!(batch.posts[2].builder.no, 1002);

        let update = batch.op.unwrap();
        assert!(update.closed);
        assert_eq!(update.replies, 2);
        assert_eq!(update.images, 1);
        assert_eq!(update.last_modified, Some(1700000500));
    }

    #[test]
    fn test_parse_catalog() {
        let batch = site()
            .parse_response(
                &Loadable::for_catalog(SiteId(2), "b"),
                CATALOG_JSON.as_bytes(),
                &PostIndex::new(),
            )
            .unwrap();
        let numbers: Vec<u64> = batch.posts.iter().map(|p| p.builder.no).collect();
        assert_eq!(numbers, vec![1000, 2000]);
        assert_eq!(batch.posts[0].builder.replies, 9);
        assert_eq!(batch.posts[1].builder.replies, 0);
    }

    #[test]
    fn test_parse_bad_number_is_a_parse_error() {
        let body = br#"{"threads":[{"posts":[{"num":"abc","op":0}]}]}"#;
        let err = site()
            .parse_response(
                &Loadable::for_thread(SiteId(2), "b", 1),
                body,
                &PostIndex::new(),
            )
            .unwrap_err();
        assert!(err.reason.starts_with("Malformed JSON"));
    }

    #[test]
    fn test_build_post_request() {
        let mut record = SiteRecord::new(SiteKind::Dvach.class_id());
        record.user_settings = serde_json::json!({ "captcha_key": "key" });
        let site = Dvach::new(&record);

        let mut reply = Reply::new(Loadable::for_thread(SiteId(2), "b", 1000), "hello");
        reply.options = "sage".into();
        reply.captcha_response = Some("token".into());
        reply.file = Some(ReplyFile {
            file_name: "a.jpg".into(),
            data: vec![1, 2, 3],
        });

        let request = site.build_post_request(&reply).unwrap();
        assert_eq!(
            request.url.as_str(),
            "https://2ch.hk/makaba/posting.fcgi?json=1"
        );
        assert_eq!(request.form_value("task"), Some("post"));
        assert_eq!(request.form_value("board"), Some("b"));
        assert_eq!(request.form_value("thread"), Some("1000"));
        assert_eq!(request.form_value("email"), Some("sage"));
        assert_eq!(request.form_value("captcha_type"), Some("recaptcha"));
        assert_eq!(request.form_value("captcha_key"), Some("key"));
        assert_eq!(request.form_value("g-recaptcha-response"), Some("token"));
        assert!(request.has_field("image"));
        assert!(site.post_requires_authentication());
    }

    #[test]
    fn test_parse_post_response() {
        let site = site();

        let ok = site.parse_post_response(br#"{"Error":null,"Status":"OK","Num":1005}"#);
        assert!(ok.posted);
        assert_eq!(ok.post_no, 1005);

        let redirect =
            site.parse_post_response(br#"{"Error":null,"Status":"Redirect","Target":3000}"#);
        assert!(redirect.posted);
        assert_eq!(redirect.thread_no, 3000);
        assert_eq!(redirect.post_no, 3000);

        let banned = site.parse_post_response(
            br#"{"Error":-6,"Reason":"You are banned. Reason: <b>spam</b>"}"#,
        );
        assert!(!banned.posted);
        assert!(banned.probably_banned);
        assert_eq!(
            banned.error_message.as_deref(),
            Some("You are banned. Reason: spam")
        );

        let garbage = site.parse_post_response(b"<html>oops</html>");
        assert!(!garbage.posted);
        assert!(garbage.error_message.is_some());
    }

    #[test]
    fn test_delete_is_unsupported() {
        let site = site();
        let request = site
            .build_delete_request(&DeleteRequest {
                board_code: "b".into(),
                post_no: 1,
                password: "x".into(),
                image_only: false,
            })
            .unwrap();
        assert!(request.is_none());
        assert!(!site.feature(SiteFeature::PostDelete));
        assert_eq!(site.boards_type(), BoardsType::Infinite);
    }

    #[test]
    fn test_resolve() {
        let site = site();
        let url = Url::parse("https://2ch.hk/b/res/1000.html#1002").unwrap();
        let loadable = site.resolve(&url).unwrap();
        assert_eq!(loadable, Loadable::for_thread(SiteId(2), "b", 1000));
        assert_eq!(loadable.marked_no, Some(1002));

        let url = Url::parse("https://2ch.pm/b/").unwrap();
        assert_eq!(site.resolve(&url), Some(Loadable::for_catalog(SiteId(2), "b")));

        let url = Url::parse("https://2ch.hk/b/catalog.html").unwrap();
        assert!(site.resolve(&url).unwrap().is_catalog());

        for bad in [
            "https://2ch.hk/",
            "https://2ch.hk/b/res/",
            "https://2ch.hk/b/res/x.html",
            "https://2ch.hk/b/arch",
            "https://4chan.org/b/res/1.html",
        ] {
            assert_eq!(site.resolve(&Url::parse(bad).unwrap()), None, "{}", bad);
        }
    }

    #[test]
    fn test_desktop_url() {
        let site = site();
        assert_eq!(
            site.desktop_url(&Loadable::for_thread(SiteId(2), "b", 1000), Some(1001)),
            "https://2ch.hk/b/res/1000.html#1001"
        );
        assert_eq!(
            site.desktop_url(&Loadable::for_catalog(SiteId(2), "b"), Some(5)),
            "https://2ch.hk/b/res/5.html"
        );
    }
}
