//! 4chan: JSON read API on `a.4cdn.org`, posting on `sys.4chan.org`.

use serde::Deserialize;
use url::Url;

use crate::domain::{
    Board, BoardFeature, BoardsType, DeleteRequest, DeleteResponse, Loadable, PostBuilder,
    PostImage, PostIndex, Reply, ReplyResponse, SiteAuthentication, SiteFeature, SiteId,
    SiteRecord,
};
use crate::fetcher::{FormBuilder, RequestBody, RequestSpec};
use crate::normalizer::{html_to_text, leading_number, CommentParser};
use crate::site::common::{self, endpoint};
use crate::site::{ParseError, ParsedBatch, SiteAdapter, SiteKind};

pub const NAME: &str = "4chan";

const CAPTCHA_KEY: &str = "6Ldp2bsSAAAAAAJ5uyx_lx34lJeEpTLVkP5k04qc";

const API_HOST: &str = "a.4cdn.org";
const IMAGE_HOST: &str = "i.4cdn.org";
const STATIC_HOST: &str = "s.4cdn.org";
const SYS_HOST: &str = "sys.4chan.org";
const BOARDS_HOST: &str = "boards.4chan.org";

const HOSTS: [&str; 6] = [
    "4chan.org",
    "www.4chan.org",
    "boards.4chan.org",
    "4channel.org",
    "www.4channel.org",
    "boards.4channel.org",
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CaptchaType {
    V2Js,
    V2NoJs,
    #[default]
    NewCaptcha,
}

impl CaptchaType {
    pub const SETTING: &'static str = "captcha_type";

    pub fn from_setting(value: &str) -> Option<Self> {
        match value {
            "v2js" => Some(CaptchaType::V2Js),
            "v2nojs" => Some(CaptchaType::V2NoJs),
            "newcaptcha" => Some(CaptchaType::NewCaptcha),
            _ => None,
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            CaptchaType::V2Js => "v2js",
            CaptchaType::V2NoJs => "v2nojs",
            CaptchaType::NewCaptcha => "newcaptcha",
        }
    }
}

pub struct Chan4 {
    id: SiteId,
    captcha_type: CaptchaType,
    parser: CommentParser,
}

impl Chan4 {
    pub fn new(record: &SiteRecord) -> Self {
        let captcha_type = record
            .setting(CaptchaType::SETTING)
            .and_then(CaptchaType::from_setting)
            .unwrap_or_default();

        Self {
            id: record.id,
            captcha_type,
            parser: CommentParser::with_internal_domains(&HOSTS),
        }
    }

    fn builder(&self, board_code: &str, post: &WirePost) -> PostBuilder {
        let mut builder = PostBuilder::new(board_code, post.no);
        builder.op = post.resto == 0;
        builder.op_id = if builder.op { post.no } else { post.resto };
        builder.name = post.name.as_deref().map(html_to_text).unwrap_or_default();
        builder.tripcode = post.trip.clone();
        builder.subject = post.sub.as_deref().map(html_to_text);
        builder.comment = post.com.clone().unwrap_or_default();
        builder.unix_time = post.time;
        builder.sticky = post.sticky == 1;
        builder.closed = post.closed == 1;
        builder.archived = post.archived == 1;
        builder.replies = post.replies;
        builder.images = post.images;
        builder.unique_ips = post.unique_ips;
        builder.last_modified = post.last_modified;
        builder.files = self.image(board_code, post).into_iter().collect();
        builder
    }

    fn image(&self, board_code: &str, post: &WirePost) -> Option<PostImage> {
        let filename = post.filename.as_deref()?;
        let extension = post.ext.as_deref()?.trim_start_matches('.');
        let tim = post.tim?;

        let spoiler = post.spoiler == 1;
        let spoiler_thumbnail_url = spoiler.then(|| match post.custom_spoiler {
            Some(n) if n > 0 => format!(
                "https://{}/image/spoiler-{}{}.png",
                STATIC_HOST, board_code, n
            ),
            _ => format!("https://{}/image/spoiler.png", STATIC_HOST),
        });

        Some(PostImage {
            original_name: tim.to_string(),
            filename: html_to_text(filename),
            extension: extension.to_string(),
            image_url: format!("https://{}/{}/{}.{}", IMAGE_HOST, board_code, tim, extension),
            thumbnail_url: format!("https://{}/{}/{}s.jpg", IMAGE_HOST, board_code, tim),
            spoiler_thumbnail_url,
            width: post.w,
            height: post.h,
            size: post.fsize,
            spoiler,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ThreadResponse {
    posts: Vec<WirePost>,
}

#[derive(Debug, Deserialize)]
struct CatalogPage {
    #[serde(default)]
    threads: Vec<WirePost>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WirePost {
    no: u64,
    resto: u64,
    sticky: u8,
    closed: u8,
    archived: u8,
    time: i64,
    name: Option<String>,
    trip: Option<String>,
    sub: Option<String>,
    com: Option<String>,
    filename: Option<String>,
    ext: Option<String>,
    tim: Option<u64>,
    w: u32,
    h: u32,
    fsize: u64,
    spoiler: u8,
    custom_spoiler: Option<u32>,
    replies: u32,
    images: u32,
    unique_ips: u32,
    last_modified: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct BoardsResponse {
    boards: Vec<WireBoard>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireBoard {
    board: String,
    title: String,
    ws_board: u8,
    spoilers: u8,
    custom_spoilers: Option<u32>,
    is_archived: u8,
}

/// Country flag requested with `[XX]` in the options field.
fn extract_flag(options: &str) -> Option<String> {
    common::extract_between(options, "[", "]")
        .filter(|f| !f.is_empty())
        .map(|f| f.to_uppercase())
}

fn strip_flags(options: &str) -> String {
    let mut out = String::with_capacity(options.len());
    let mut rest = options;
    while let Some(start) = rest.find('[') {
        match rest[start..].find(']') {
            Some(end) => {
                out.push_str(&rest[..start]);
                rest = &rest[start + end + 1..];
            }
            None => break,
        }
    }
    out.push_str(rest);
    out
}

fn error_message(html: &str) -> Option<String> {
    let after = &html[html.find("\"errmsg\"")? + "\"errmsg\"".len()..];
    let content = &after[after.find('>')? + 1..];
    let end = content.find("</span")?;
    Some(common::message_text(&content[..end]))
}

impl SiteAdapter for Chan4 {
    fn id(&self) -> SiteId {
        self.id
    }

    fn kind(&self) -> SiteKind {
        SiteKind::Chan4
    }

    fn name(&self) -> &str {
        NAME
    }

    fn boards_type(&self) -> BoardsType {
        BoardsType::Dynamic
    }

    fn feature(&self, feature: SiteFeature) -> bool {
        match feature {
            SiteFeature::Posting => true,
            SiteFeature::PostDelete => true,
            SiteFeature::PostReport => true,
        }
    }

    fn board_feature(&self, feature: BoardFeature, board: &Board) -> bool {
        match feature {
            BoardFeature::PostingImage => true,
            BoardFeature::PostingSpoiler => board.spoilers,
            BoardFeature::Archive => board.archive,
        }
    }

    fn comment_parser(&self) -> &CommentParser {
        &self.parser
    }

    fn build_fetch_request(&self, loadable: &Loadable) -> Result<RequestSpec, url::ParseError> {
        let url = if loadable.is_catalog() {
            endpoint(API_HOST, &[&loadable.board_code, "catalog.json"])?
        } else {
            let file = format!("{}.json", loadable.no);
            endpoint(API_HOST, &[&loadable.board_code, "thread", &file])?
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
            let thread: ThreadResponse = serde_json::from_slice(body)?;
            for post in &thread.posts {
                if post.no == 0 {
                    return Err(ParseError::new("Post without a number"));
                }
                let builder = self.builder(&loadable.board_code, post);
                if builder.op {
                    batch.op = Some(builder.op_update());
                }
                batch.push(builder, previous);
            }
        } else {
            // Catalog entries carry live reply counts, so they are always rebuilt.
            let pages: Vec<CatalogPage> = serde_json::from_slice(body)?;
            for thread in pages.iter().flat_map(|p| &p.threads) {
                batch.push_fresh(self.builder(&loadable.board_code, thread));
            }
        }

        Ok(batch)
    }

    fn build_boards_request(&self) -> Result<Option<RequestSpec>, url::ParseError> {
        Ok(Some(RequestSpec::get(endpoint(API_HOST, &["boards.json"])?)))
    }

    fn parse_boards(&self, body: &[u8]) -> Result<Vec<Board>, ParseError> {
        let response: BoardsResponse = serde_json::from_slice(body)?;

        Ok(response
            .boards
            .into_iter()
            .enumerate()
            .map(|(order, wire)| {
                let mut board = Board::new(self.id, &html_to_text(&wire.title), &wire.board);
                board.work_safe = wire.ws_board == 1;
                board.spoilers = wire.spoilers == 1;
                board.custom_spoilers = wire.custom_spoilers;
                board.archive = wire.is_archived == 1;
                board.order = order as i64;
                board
            })
            .collect())
    }

    fn default_boards(&self) -> Vec<Board> {
        [
            ("Technology", "g"),
            ("Food & Cooking", "ck"),
            ("Do It Yourself", "diy"),
            ("Animals & Nature", "an"),
        ]
        .into_iter()
        .enumerate()
        .map(|(order, (name, code))| {
            let mut board = Board::new(self.id, name, code);
            board.work_safe = true;
            board.order = order as i64;
            board
        })
        .collect()
    }

    fn build_post_request(&self, reply: &Reply) -> Result<RequestSpec, url::ParseError> {
        let url = endpoint(SYS_HOST, &[&reply.loadable.board_code, "post"])?;
        let mut form = FormBuilder::new();

        let mut options = reply.options.clone();
        if let Some(flag) = extract_flag(&options) {
            form.text("flag", flag);
            options = strip_flags(&options);
        }

        form.text("mode", "regist");
        form.text("pwd", reply.password.clone().unwrap_or_default());

        if reply.loadable.is_thread() {
            form.text("resto", reply.loadable.no.to_string());
        }

        common::add_author_fields(&mut form, reply, &options, "sub");
        form.text("com", reply.comment.clone());

        if let Some(response) = &reply.captcha_response {
            match &reply.captcha_challenge {
                Some(challenge) => {
                    form.text("t-challenge", challenge.clone());
                    form.text("t-response", response.clone());
                }
                None => {
                    form.text("g-recaptcha-response", response.clone());
                }
            }
        }

        common::add_file(&mut form, reply, "upfile");

        if reply.spoiler_image {
            form.text("spoiler", "on");
        }

        Ok(RequestSpec::post(url, form.build()))
    }

    fn parse_post_response(&self, body: &[u8]) -> ReplyResponse {
        let html = String::from_utf8_lossy(body);
        let mut response = ReplyResponse::default();

        if let Some(message) = error_message(&html) {
            response.probably_banned = common::probably_banned(&message);
            response.require_authentication = common::mentions_captcha(&message);
            response.error_message = Some(message);
            return response;
        }

        let thread_no = common::extract_between(&html, "<!-- thread:", ",").and_then(leading_number);
        let post_no = common::extract_between(&html, ",no:", " -->").and_then(leading_number);

        match (thread_no, post_no) {
            (Some(thread_no), Some(post_no)) => {
                response.posted = true;
                response.post_no = post_no;
                response.thread_no = if thread_no == 0 { post_no } else { thread_no };
            }
            _ => {
                response.error_message = Some("Unexpected response from the server".to_string());
            }
        }

        response
    }

    fn post_requires_authentication(&self) -> bool {
        true
    }

    fn post_authenticate(&self) -> SiteAuthentication {
        match self.captcha_type {
            CaptchaType::V2Js => SiteAuthentication::Captcha2 {
                site_key: CAPTCHA_KEY.to_string(),
                base_url: format!("https://{}", BOARDS_HOST),
            },
            CaptchaType::V2NoJs => SiteAuthentication::Captcha2NoJs {
                site_key: CAPTCHA_KEY.to_string(),
                base_url: format!("https://{}", BOARDS_HOST),
            },
            CaptchaType::NewCaptcha => SiteAuthentication::NewCaptcha {
                base_url: format!("https://{}", SYS_HOST),
            },
        }
    }

    fn build_delete_request(
        &self,
        request: &DeleteRequest,
    ) -> Result<Option<RequestSpec>, url::ParseError> {
        let url = endpoint(SYS_HOST, &[&request.board_code, "imgboard.php"])?;

        let mut fields = vec![(request.post_no.to_string(), "delete".to_string())];
        if request.image_only {
            fields.push(("onlyimgdel".to_string(), "on".to_string()));
        }
        fields.push(("pwd".to_string(), request.password.clone()));
        fields.push(("mode".to_string(), "usrdel".to_string()));

        Ok(Some(RequestSpec::post(url, RequestBody::Form(fields))))
    }

    fn parse_delete_response(&self, body: &[u8]) -> DeleteResponse {
        let html = String::from_utf8_lossy(body);
        match error_message(&html) {
            Some(message) => DeleteResponse {
                deleted: false,
                error_message: Some(message),
            },
            None => DeleteResponse {
                deleted: true,
                error_message: None,
            },
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

        if parts.len() < 3 {
            return Some(Loadable::for_catalog(self.id, board_code));
        }

        let no = leading_number(parts[2]).filter(|no| *no > 0)?;
        let mut loadable = Loadable::for_thread(self.id, board_code, no);
        loadable.marked_no = common::post_fragment(url);
        Some(loadable)
    }

    fn desktop_url(&self, loadable: &Loadable, post_no: Option<u64>) -> String {
        if loadable.is_catalog() {
            let thread = post_no.map(|no| format!("thread/{}", no)).unwrap_or_default();
            format!("https://{}/{}/{}", BOARDS_HOST, loadable.board_code, thread)
        } else {
            let mut url = format!(
                "https://{}/{}/thread/{}",
                BOARDS_HOST, loadable.board_code, loadable.no
            );
            if let Some(no) = post_no {
                url.push_str(&format!("#p{}", no));
            }
            url
        }
    }

    fn modify_request(&self, request: &mut RequestSpec) {
        if request.url.host_str() == Some(SYS_HOST) {
            request.set_header("Referer", &format!("https://{}/", BOARDS_HOST));
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::domain::ReplyFile;
    use crate::fetcher::Method;

    const THREAD_JSON: &str = r##"{"posts":[
        {"no":570368,"resto":0,"sticky":1,"closed":0,"now":"01/01/24","time":1704067200,
         "name":"Anonymous","sub":"Thread &amp; subject","com":"OP text",
         "filename":"image","ext":".png","w":800,"h":600,"tn_w":250,"tn_h":187,
         "tim":1704067200123,"fsize":12345,"replies":2,"images":1,"unique_ips":2},
        {"no":570369,"resto":570368,"time":1704067260,"name":"Anonymous",
         "com":"<a href=\"#p570368\" class=\"quotelink\">&gt;&gt;570368</a><br>reply"},
        {"no":570370,"resto":570368,"time":1704067320,"name":"Anonymous","trip":"!abc"}
    ]}"##;

    const CATALOG_JSON: &str = r#"[
        {"page":1,"threads":[
            {"no":10,"resto":0,"time":1,"sub":"first","replies":5},
            {"no":20,"resto":0,"time":2,"com":"second","replies":0}
        ]},
        {"page":2,"threads":[{"no":30,"resto":0,"time":3}]}
    ]"#;

    const BOARDS_JSON: &str = r#"{"boards":[
        {"board":"3","title":"3DCG","ws_board":1,"per_page":15,"pages":10},
        {"board":"a","title":"Anime &amp; Manga","ws_board":1,"spoilers":1,"custom_spoilers":1,"is_archived":1}
    ]}"#;

    fn site() -> Chan4 {
        let mut record = SiteRecord::new(SiteKind::Chan4.class_id());
        record.id = SiteId(1);
        Chan4::new(&record)
    }

    #[test]
    fn test_fetch_requests() {
        let site = site();
        let thread = site
            .build_fetch_request(&Loadable::for_thread(SiteId(1), "g", 570368))
            .unwrap();
        assert_eq!(thread.method, Method::Get);
        assert_eq!(thread.url.as_str(), "https://a.4cdn.org/g/thread/570368.json");

        let catalog = site
            .build_fetch_request(&Loadable::for_catalog(SiteId(1), "g"))
            .unwrap();
        assert_eq!(catalog.url.as_str(), "https://a.4cdn.org/g/catalog.json");

        // Pure: the same loadable always yields the same request.
        assert_eq!(
            site.build_fetch_request(&Loadable::for_catalog(SiteId(1), "g")).unwrap(),
            catalog
        );
    }

    #[test]
    fn test_parse_thread() {
        let site = site();
        let loadable = Loadable::for_thread(SiteId(1), "g", 570368);
        let batch = site
            .parse_response(&loadable, THREAD_JSON.as_bytes(), &PostIndex::new())
            .unwrap();

        assert_eq!(batch.len(), 3);
        let op = &batch.posts[0].builder;
        assert!(op.op);
        assert_eq!(op.subject.as_deref(), Some("Thread & subject"));
        assert_eq!(op.files.len(), 1);
        assert_eq!(
            op.files[0].image_url,
            "https://i.4cdn.org/g/1704067200123.png"
        );
        assert_eq!(
            op.files[0].thumbnail_url,
            "https://i.4cdn.org/g/1704067200123s.jpg"
        );
        assert_eq!(batch.posts[1].builder.op_id, 570368);
        assert_eq!(batch.posts[2].builder.tripcode.as_deref(), Some("!abc"));

        let update = batch.op.unwrap();
        assert!(update.sticky);
        assert_eq!(update.replies, 2);
        assert_eq!(update.unique_ips, 2);
    }

    #[test]
    fn test_parse_thread_marks_previous_posts_unchanged() {
        let site = site();
        let loadable = Loadable::for_thread(SiteId(1), "g", 570368);
        let mut previous = PostIndex::new();
        let post = PostBuilder::new("g", 570369).build(site.comment_parser());
        previous.insert(570369, Arc::new(post));

        let batch = site
            .parse_response(&loadable, THREAD_JSON.as_bytes(), &previous)
            .unwrap();
        let flags: Vec<bool> = batch.posts.iter().map(|p| p.unchanged).collect();
        assert_eq!(flags, vec![false, true, false]);
    }

    #[test]
    fn test_parse_catalog() {
        let site = site();
        let mut previous = PostIndex::new();
        previous.insert(
            10,
            Arc::new(PostBuilder::new("g", 10).build(site.comment_parser())),
        );

        let batch = site
            .parse_response(
                &Loadable::for_catalog(SiteId(1), "g"),
                CATALOG_JSON.as_bytes(),
                &previous,
            )
            .unwrap();

        let numbers: Vec<u64> = batch.posts.iter().map(|p| p.builder.no).collect();
        assert_eq!(numbers, vec![10, 20, 30]);
        assert!(batch.posts.iter().all(|p| !p.unchanged));
        assert!(batch.op.is_none());
        assert_eq!(batch.posts[0].builder.replies, 5);
    }

    #[test]
    fn test_parse_malformed_payload() {
        let site = site();
        let err = site
            .parse_response(
                &Loadable::for_thread(SiteId(1), "g", 1),
                b"<html>502 Bad Gateway</html>",
                &PostIndex::new(),
            )
            .unwrap_err();
        assert!(err.reason.starts_with("Malformed JSON"));
    }

    #[test]
    fn test_parse_boards() {
        let boards = site().parse_boards(BOARDS_JSON.as_bytes()).unwrap();
        assert_eq!(boards.len(), 2);
        assert_eq!(boards[0].code, "3");
        assert!(boards[0].work_safe);
        assert!(!boards[0].archive);
        assert_eq!(boards[1].name, "Anime & Manga");
        assert!(boards[1].spoilers);
        assert!(boards[1].archive);
        assert_eq!(boards[1].custom_spoilers, Some(1));
        assert_eq!(boards[1].order, 1);
    }

    #[test]
    fn test_build_post_request() {
        let site = site();
        let mut reply = Reply::new(Loadable::for_thread(SiteId(1), "g", 570368), "hello");
        reply.name = "name".into();
        reply.options = "sage [us]".into();
        reply.subject = "ignored for replies".into();
        reply.password = Some("secret".into());
        reply.captcha_response = Some("token".into());
        reply.file = Some(ReplyFile {
            file_name: "a.png".into(),
            data: vec![0x89, 0x50],
        });
        reply.spoiler_image = true;

        let mut request = site.build_post_request(&reply).unwrap();
        site.modify_request(&mut request);

        assert_eq!(request.url.as_str(), "https://sys.4chan.org/g/post");
        assert_eq!(request.form_value("mode"), Some("regist"));
        assert_eq!(request.form_value("flag"), Some("US"));
        assert_eq!(request.form_value("email"), Some("sage "));
        assert_eq!(request.form_value("resto"), Some("570368"));
        assert_eq!(request.form_value("pwd"), Some("secret"));
        assert_eq!(request.form_value("com"), Some("hello"));
        assert_eq!(request.form_value("g-recaptcha-response"), Some("token"));
        assert_eq!(request.form_value("spoiler"), Some("on"));
        assert!(request.has_field("upfile"));
        assert!(!request.has_field("sub"));
        assert_eq!(request.header("Referer"), Some("https://boards.4chan.org/"));
    }

    #[test]
    fn test_new_thread_post_has_subject_and_no_resto() {
        let site = site();
        let mut reply = Reply::new(Loadable::for_catalog(SiteId(1), "g"), "op");
        reply.subject = "subject".into();
        reply.captcha_challenge = Some("challenge".into());
        reply.captcha_response = Some("answer".into());

        let request = site.build_post_request(&reply).unwrap();
        assert!(!request.has_field("resto"));
        assert_eq!(request.form_value("sub"), Some("subject"));
        assert_eq!(request.form_value("t-challenge"), Some("challenge"));
        assert_eq!(request.form_value("t-response"), Some("answer"));
    }

    #[test]
    fn test_parse_post_response_success() {
        let site = site();
        let body = b"<html><head><title>Post successful!</title></head><body><!-- thread:570368,no:570400 --></body></html>";
        let response = site.parse_post_response(body);
        assert!(response.posted);
        assert_eq!(response.thread_no, 570368);
        assert_eq!(response.post_no, 570400);

        let body = b"<!-- thread:0,no:570500 -->";
        let response = site.parse_post_response(body);
        assert_eq!(response.thread_no, 570500);
    }

    #[test]
    fn test_parse_post_response_errors() {
        let site = site();
        let body = br#"<span id="errmsg" style="color: red;">Error: You forgot to solve the CAPTCHA. Please try again.</span>"#;
        let response = site.parse_post_response(body);
        assert!(!response.posted);
        assert!(response.require_authentication);
        assert!(!response.probably_banned);

        let body = br#"<span id="errmsg" style="color: red;">Error: You are <a href="https://www.4chan.org/banned">banned</a>.</span>"#;
        let response = site.parse_post_response(body);
        assert!(response.probably_banned);
        assert_eq!(
            response.error_message.as_deref(),
            Some("Error: You are banned.")
        );
    }

    #[test]
    fn test_delete_request_and_response() {
        let site = site();
        let request = site
            .build_delete_request(&DeleteRequest {
                board_code: "g".into(),
                post_no: 570400,
                password: "secret".into(),
                image_only: true,
            })
            .unwrap()
            .unwrap();

        assert_eq!(request.url.as_str(), "https://sys.4chan.org/g/imgboard.php");
        assert_eq!(request.form_value("570400"), Some("delete"));
        assert_eq!(request.form_value("onlyimgdel"), Some("on"));
        assert_eq!(request.form_value("mode"), Some("usrdel"));

        assert!(site.parse_delete_response(b"Updating index...").deleted);
        let failed = site.parse_delete_response(
            br#"<span id="errmsg">Password incorrect.</span>"#,
        );
        assert!(!failed.deleted);
        assert_eq!(failed.error_message.as_deref(), Some("Password incorrect."));
    }

    #[test]
    fn test_resolve() {
        let site = site();
        let url = Url::parse("https://boards.4chan.org/g/thread/570368/some-slug#p570369").unwrap();
        let loadable = site.resolve(&url).unwrap();
        assert_eq!(loadable, Loadable::for_thread(SiteId(1), "g", 570368));
        assert_eq!(loadable.marked_no, Some(570369));

        let url = Url::parse("https://boards.4channel.org/g/").unwrap();
        assert_eq!(
            site.resolve(&url),
            Some(Loadable::for_catalog(SiteId(1), "g"))
        );

        let url = Url::parse("https://boards.4chan.org/g/catalog").unwrap();
        assert!(site.resolve(&url).unwrap().is_catalog());
    }

    #[test]
    fn test_resolve_rejects_foreign_and_malformed_urls() {
        let site = site();
        for url in [
            "https://example.com/g/thread/1",
            "https://boards.4chan.org/",
            "https://boards.4chan.org/g/thread/notanumber",
            "https://boards.4chan.org/g/thread/0",
        ] {
            let url = Url::parse(url).unwrap();
            assert_eq!(site.resolve(&url), None, "{}", url);
        }
    }

    #[test]
    fn test_desktop_url() {
        let site = site();
        assert_eq!(
            site.desktop_url(&Loadable::for_thread(SiteId(1), "g", 5), Some(6)),
            "https://boards.4chan.org/g/thread/5#p6"
        );
        assert_eq!(
            site.desktop_url(&Loadable::for_catalog(SiteId(1), "g"), None),
            "https://boards.4chan.org/g/"
        );
    }

    #[test]
    fn test_post_authenticate_follows_setting() {
        let mut record = SiteRecord::new(SiteKind::Chan4.class_id());
        assert!(matches!(
            Chan4::new(&record).post_authenticate(),
            SiteAuthentication::NewCaptcha { .. }
        ));

        record.user_settings = serde_json::json!({ "captcha_type": "v2nojs" });
        assert!(matches!(
            Chan4::new(&record).post_authenticate(),
            SiteAuthentication::Captcha2NoJs { .. }
        ));
    }

    #[test]
    fn test_strip_flags() {
        assert_eq!(strip_flags("sage [US] x"), "sage  x");
        assert_eq!(strip_flags("no flags"), "no flags");
        assert_eq!(extract_flag("[]"), None);
    }
}
