use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::app::{AppContext, Result, WatchError};
use crate::domain::{DeleteRequest, Loadable, Post, Reply, ReplyFile, SiteId, ThreadSnapshot};
use crate::loader::{BackoffLadder, LoaderEvent, Subscription, ThreadLoader};
use crate::site::{SiteAdapter, SiteKind};

pub fn list_sites(ctx: &AppContext) -> Result<()> {
    let sites = ctx.registry.all_in_order();

    if sites.is_empty() {
        println!("No sites registered. Add one with: threadwatch sites add 4chan");
        return Ok(());
    }

    for site in sites {
        println!("{:>4}  {}", site.id(), site.name());
    }
    Ok(())
}

pub fn add_site(ctx: &AppContext, kind: &str) -> Result<()> {
    let kind: SiteKind = kind.parse().map_err(WatchError::Other)?;
    let site = ctx.registry.add_site(kind)?;
    println!("Added site {} ({})", site.id(), site.name());
    Ok(())
}

pub fn remove_site(ctx: &AppContext, id: i64) -> Result<()> {
    let site = site_for(ctx, SiteId(id))?;
    ctx.registry.remove_site(site.id())?;
    println!("Removed site {} ({})", site.id(), site.name());
    Ok(())
}

pub fn order_sites(ctx: &AppContext, ids: &[i64]) -> Result<()> {
    let ids: Vec<SiteId> = ids.iter().copied().map(SiteId).collect();
    ctx.registry.update_ordering(&ids)?;
    list_sites(ctx)
}

pub fn update_site_settings(ctx: &AppContext, id: i64, json: &str) -> Result<()> {
    let settings = parse_settings(json)?;
    let site = ctx.registry.update_user_settings(SiteId(id), settings)?;
    println!("Updated settings of site {} ({})", site.id(), site.name());
    Ok(())
}

fn parse_settings(json: &str) -> Result<serde_json::Value> {
    let value: serde_json::Value = serde_json::from_str(json)?;
    if !value.is_object() {
        return Err(WatchError::Other(
            "Site settings must be a JSON object".to_string(),
        ));
    }
    Ok(value)
}

pub async fn list_boards(ctx: &AppContext, id: i64, refresh: bool) -> Result<()> {
    let site = site_for(ctx, SiteId(id))?;

    if refresh {
        if site.boards_type().can_list() {
            let boards = ctx.actions.boards(site.as_ref()).await;
            ctx.boards.update_available_boards(site.id(), &boards)?;
        } else {
            println!("{} cannot list its boards; add them with add-board", site.name());
        }
    }

    let boards = ctx.boards.boards(site.id())?;
    if boards.is_empty() {
        println!("No boards saved for {}", site.name());
        return Ok(());
    }

    for board in boards {
        let nsfw = if board.work_safe { "" } else { " (nsfw)" };
        println!("{:<8} {}{}", board.display_code(), board.name, nsfw);
    }
    Ok(())
}

pub fn add_board(ctx: &AppContext, id: i64, code: &str, name: Option<&str>) -> Result<()> {
    let site = site_for(ctx, SiteId(id))?;
    let code = code.trim().trim_matches('/');
    if code.is_empty() {
        return Err(WatchError::Other("Board code cannot be empty".to_string()));
    }

    let board = ctx.boards.create_board(site.id(), name.unwrap_or(code), code)?;
    println!("Board {} on {}: {}", board.display_code(), site.name(), board.name);
    Ok(())
}

pub fn resolve_url(ctx: &AppContext, url: &str) -> Result<()> {
    let (site, loadable) = resolve(ctx, url)?;

    println!("Site:   {} ({})", site.name(), site.id());
    println!("Board:  /{}/", loadable.board_code);
    if loadable.is_thread() {
        println!("Thread: {}", loadable.no);
    } else {
        println!("Catalog");
    }
    if let Some(marked) = loadable.marked_no {
        println!("Post:   {}", marked);
    }
    println!("URL:    {}", site.desktop_url(&loadable, loadable.marked_no));
    Ok(())
}

/// Follow a loadable until interrupted, printing posts not seen before.
pub async fn watch(ctx: &AppContext, url: &str) -> Result<()> {
    let (site, loadable) = resolve(ctx, url)?;
    let (loader, mut subscription) = ctx.pool.watch(&loadable, site.clone()).await?;

    println!("Watching {} (Ctrl-C to stop)", site.desktop_url(&loadable, None));

    let retry_floor = BackoffLadder::from_secs(&ctx.config.loader.watch_timeouts).delay(0);
    let mut seen = HashSet::new();
    let result = tokio::select! {
        _ = tokio::signal::ctrl_c() => Ok(()),
        result = follow(&loader, &mut subscription, retry_floor, |snapshot| {
            print_new_posts(snapshot, &mut seen)
        }) => result,
    };

    ctx.pool.release(&loadable, subscription.id).await?;
    result
}

/// Consume loader events until the resource is gone.
///
/// Failed loads are retried after the loader's backoff delay, but never
/// sooner than `retry_floor`. Catalogs are not polled, so a catalog is
/// done after its first successful load.
async fn follow(
    loader: &ThreadLoader,
    subscription: &mut Subscription,
    retry_floor: Duration,
    mut on_snapshot: impl FnMut(&ThreadSnapshot),
) -> Result<()> {
    loop {
        match subscription.events.recv().await {
            Some(LoaderEvent::Data(snapshot)) => {
                on_snapshot(&snapshot);
                if loader.id().is_catalog() {
                    return Ok(());
                }
            }
            Some(LoaderEvent::Error(e)) if e.is_not_found() => {
                println!("{} is gone", loader.id());
                return Ok(());
            }
            Some(LoaderEvent::Error(e)) => {
                let status = loader.status().await?;
                let wait = u64::try_from(status.time_until_load_more_ms).unwrap_or(0);
                let delay = Duration::from_millis(wait).max(retry_floor);
                println!("Load failed: {} (retrying in {}s)", e, delay.as_secs());

                tokio::time::sleep(delay).await;
                if loader.id().is_catalog() {
                    loader.start()?;
                } else {
                    loader.request_more().await?;
                }
            }
            None => return Err(WatchError::LoaderClosed),
        }
    }
}

fn print_new_posts(snapshot: &ThreadSnapshot, seen: &mut HashSet<u64>) {
    if seen.is_empty() {
        if let Some(title) = snapshot.title() {
            println!("== {} ==", title);
        }
    }

    let mut fresh = 0;
    for post in &snapshot.posts {
        if seen.insert(post.no) {
            println!("{}", format_post(post));
            fresh += 1;
        }
    }

    if fresh == 0 {
        if let Some(op) = snapshot.op() {
            if op.archived || op.closed {
                println!("-- thread is {} --", if op.archived { "archived" } else { "closed" });
            }
        }
    }
}

fn format_post(post: &Post) -> String {
    let mut header = format!(
        "No.{} {} {}",
        post.no,
        post.display_name(),
        post.time.format("%Y-%m-%d %H:%M:%S")
    );
    if let Some(trip) = &post.tripcode {
        header.push(' ');
        header.push_str(trip);
    }
    if let Some(subject) = post.subject.as_deref().filter(|s| !s.is_empty()) {
        header.push_str(&format!(" [{}]", subject));
    }

    let mut out = header;
    for file in &post.files {
        out.push_str(&format!("\n  File: {} ({}x{})", file.image_url, file.width, file.height));
    }
    if !post.text.is_empty() {
        for line in post.text.lines() {
            out.push_str("\n  ");
            out.push_str(line);
        }
    }
    out
}

pub struct PostOptions<'a> {
    pub comment: &'a str,
    pub name: &'a str,
    pub subject: &'a str,
    pub options: &'a str,
    pub file: Option<&'a Path>,
    pub spoiler: bool,
    pub captcha: Option<&'a str>,
    pub challenge: Option<&'a str>,
    pub password: Option<&'a str>,
}

pub async fn post(ctx: &AppContext, url: &str, opts: PostOptions<'_>) -> Result<()> {
    let (site, loadable) = resolve(ctx, url)?;

    let mut reply = Reply::new(loadable, opts.comment);
    reply.name = opts.name.to_string();
    reply.subject = opts.subject.to_string();
    reply.options = opts.options.to_string();
    reply.spoiler_image = opts.spoiler;
    reply.captcha_response = opts.captcha.map(str::to_string);
    reply.captcha_challenge = opts.challenge.map(str::to_string);
    reply.password = opts.password.map(str::to_string);

    if let Some(path) = opts.file {
        let data = std::fs::read(path)?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "file".to_string());
        reply.file = Some(ReplyFile { file_name, data });
    }

    match ctx.actions.post(site.as_ref(), &mut reply).await {
        Ok(posted) => {
            let thread = Loadable::for_thread(site.id(), &reply.loadable.board_code, posted.thread_no);
            println!("Posted No.{}", posted.post_no);
            println!("URL:      {}", site.desktop_url(&thread, Some(posted.post_no)));
            println!("Password: {}", posted.password);
            Ok(())
        }
        Err(WatchError::Validation {
            message,
            probably_banned: true,
        }) => {
            println!("You appear to be banned: {}", message);
            Err(WatchError::Validation {
                message,
                probably_banned: true,
            })
        }
        Err(e) => Err(e),
    }
}

pub async fn delete(
    ctx: &AppContext,
    url: &str,
    post_no: u64,
    password: &str,
    image_only: bool,
) -> Result<()> {
    let (site, loadable) = resolve(ctx, url)?;
    let request = DeleteRequest {
        board_code: loadable.board_code.clone(),
        post_no,
        password: password.to_string(),
        image_only,
    };

    ctx.actions.delete(site.as_ref(), &request).await?;
    if image_only {
        println!("Deleted the file of No.{}", post_no);
    } else {
        println!("Deleted No.{}", post_no);
    }
    Ok(())
}

fn site_for(ctx: &AppContext, id: SiteId) -> Result<Arc<dyn SiteAdapter>> {
    ctx.registry.for_id(id).ok_or(WatchError::SiteNotFound(id))
}

fn resolve(ctx: &AppContext, url: &str) -> Result<(Arc<dyn SiteAdapter>, Loadable)> {
    let loadable = ctx
        .registry
        .resolve(url)
        .ok_or_else(|| WatchError::Other(format!("No registered site handles {}", url)))?;
    let site = site_for(ctx, loadable.site_id)?;
    Ok((site, loadable))
}
