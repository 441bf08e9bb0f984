use serde::Serialize;
use serde_json::{Map, Value};

use crate::dates;
use crate::models::PostRow;

#[derive(Serialize, Debug)]
pub struct Guid {
    pub rendered: String,
    pub raw: String,
}

#[derive(Serialize, Debug)]
pub struct Title {
    pub raw: String,
    pub rendered: String,
}

#[derive(Serialize, Debug)]
pub struct Content {
    pub raw: String,
    pub rendered: String,
    pub protected: bool,
    pub block_version: i32,
}

#[derive(Serialize, Debug)]
pub struct Excerpt {
    pub raw: String,
    pub rendered: String,
    pub protected: bool,
}

/// The full edit-context representation of a post.
#[derive(Serialize, Debug)]
pub struct PostResponse {
    pub id: i64,
    pub date: Option<String>,
    pub date_gmt: Option<String>,
    pub guid: Guid,
    pub modified: Option<String>,
    pub modified_gmt: Option<String>,
    pub slug: String,
    pub status: String,
    #[serde(rename = "type")]
    pub post_type: String,
    pub link: String,
    pub title: Title,
    pub content: Content,
    pub excerpt: Excerpt,
    pub author: i64,
    pub featured_media: i64,
    pub comment_status: String,
    pub ping_status: String,
    pub sticky: bool,
    pub template: String,
    pub format: String,
    pub meta: Map<String, Value>,
    pub categories: Vec<i64>,
    pub tags: Vec<i64>,
    pub password: String,
    pub permalink_template: String,
    pub generated_slug: String,
}

/// Side-channel lookups gathered alongside the row.
#[derive(Debug, Default)]
pub struct Derived {
    pub featured_media: i64,
    pub template: String,
    pub sticky: bool,
    /// Raw format term slug, e.g. "post-format-aside".
    pub format_slug: Option<String>,
    /// All metadata, first value per key, in storage order.
    pub meta: Vec<(String, String)>,
    pub categories: Vec<i64>,
    pub tags: Vec<i64>,
}

#[derive(Debug, Clone)]
pub struct RenderContext {
    pub site_url: String,
    pub gmt_offset: f64,
}

const FORMAT_PREFIX: &str = "post-format-";
const INTERNAL_META_PREFIX: char = '_';

pub fn build(post: &PostRow, derived: Derived, ctx: &RenderContext) -> PostResponse {
    let protected = !post.post_password.is_empty();
    let rendered = |raw: &str| if protected { String::new() } else { raw.to_string() };

    let date = dates::storage_to_wire(&post.post_date);
    // Drafts can carry a zero GMT date alongside a real local one; derive
    // it from the local value instead of reading the column.
    let date_gmt = if post.post_date_gmt == dates::ZERO_DATE {
        dates::parse_storage(&post.post_date)
            .map(|local| dates::local_to_gmt(local, ctx.gmt_offset))
            .map(|gmt| gmt.format("%Y-%m-%dT%H:%M:%S").to_string())
    } else {
        dates::storage_to_wire(&post.post_date_gmt)
    };

    let guid_value = if post.guid.is_empty() {
        format!("{}/?p={}", ctx.site_url, post.id)
    } else {
        post.guid.clone()
    };

    let format = derived
        .format_slug
        .as_deref()
        .map(|slug| slug.strip_prefix(FORMAT_PREFIX).unwrap_or(slug).to_string())
        .unwrap_or_else(|| "standard".to_string());

    let meta: Map<String, Value> = derived
        .meta
        .into_iter()
        .filter(|(k, _)| !k.starts_with(INTERNAL_META_PREFIX))
        .map(|(k, v)| (k, Value::String(v)))
        .collect();

    PostResponse {
        id: post.id,
        date,
        date_gmt,
        guid: Guid {
            rendered: guid_value.clone(),
            raw: guid_value,
        },
        modified: dates::storage_to_wire(&post.post_modified),
        modified_gmt: dates::storage_to_wire(&post.post_modified_gmt),
        slug: post.post_name.clone(),
        status: post.post_status.clone(),
        post_type: post.post_type.clone(),
        link: permalink(post, ctx),
        title: Title {
            raw: post.post_title.clone(),
            rendered: post.post_title.clone(),
        },
        content: Content {
            raw: post.post_content.clone(),
            rendered: rendered(&post.post_content),
            protected,
            block_version: 0,
        },
        excerpt: Excerpt {
            raw: post.post_excerpt.clone(),
            rendered: rendered(&post.post_excerpt),
            protected,
        },
        author: post.post_author,
        featured_media: derived.featured_media,
        comment_status: post.comment_status.clone(),
        ping_status: post.ping_status.clone(),
        sticky: derived.sticky,
        template: derived.template,
        format,
        meta,
        categories: derived.categories,
        tags: derived.tags,
        password: post.post_password.clone(),
        permalink_template: permalink_template(post, ctx),
        generated_slug: sanitize_slug(&post.post_title),
    }
}

/// Published posts with a slug get a date-partitioned pretty path; every
/// other post falls back to the query form.
fn permalink(post: &PostRow, ctx: &RenderContext) -> String {
    if post.post_status == "publish" && !post.post_name.is_empty() {
        if let Some(local) = dates::parse_storage(&post.post_date) {
            return format!(
                "{}/{}/{}/",
                ctx.site_url,
                local.format("%Y/%m/%d"),
                post.post_name
            );
        }
    }
    format!("{}/?p={}", ctx.site_url, post.id)
}

fn permalink_template(post: &PostRow, ctx: &RenderContext) -> String {
    if let Some(local) = dates::parse_storage(&post.post_date) {
        format!("{}/{}/%postname%/", ctx.site_url, local.format("%Y/%m/%d"))
    } else {
        format!("{}/?p={}", ctx.site_url, post.id)
    }
}

/// Lowercased, hyphen-separated form of a title.
pub fn sanitize_slug(title: &str) -> String {
    let mut out = String::with_capacity(title.len());
    let mut last_dash = true;
    for c in title.chars() {
        if c.is_alphanumeric() {
            for lc in c.to_lowercase() {
                out.push(lc);
            }
            last_dash = false;
        } else if !last_dash {
            out.push('-');
            last_dash = true;
        }
    }
    while out.ends_with('-') {
        out.pop();
    }
    out
}
