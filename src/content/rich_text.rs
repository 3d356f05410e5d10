//! Rich-text document rendering
//!
//! The CMS stores some bodies as a JSON node tree (`nodeType`, `content`,
//! `value`, `marks`, `data`) instead of Markdown. This module turns such a tree
//! into HTML. Unknown node types render their children so that new block types
//! degrade to their text.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::asset::Asset;
use crate::helpers::escape_html;

/// One node of a rich-text document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub node_type: String,
    #[serde(default)]
    pub content: Vec<Node>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub marks: Vec<Mark>,
    #[serde(default)]
    pub data: Value,
}

/// Inline formatting applied to a text node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mark {
    #[serde(rename = "type")]
    pub kind: String,
}

impl Node {
    /// Concatenated text of the whole subtree
    pub fn plain_text(&self) -> String {
        let mut out = String::new();
        collect_text(self, &mut out);
        out
    }

    fn target(&self) -> Option<&Value> {
        self.data.get("target")
    }
}

/// Render a rich-text document to HTML
pub fn render(node: &Node) -> String {
    let mut out = String::new();
    render_into(node, &mut out);
    out
}

fn render_children(node: &Node, out: &mut String) {
    for child in &node.content {
        render_into(child, out);
    }
}

fn wrap(tag: &str, node: &Node, out: &mut String) {
    out.push('<');
    out.push_str(tag);
    out.push('>');
    render_children(node, out);
    out.push_str("</");
    out.push_str(tag);
    out.push('>');
}

fn render_into(node: &Node, out: &mut String) {
    match node.node_type.as_str() {
        "document" => render_children(node, out),
        "paragraph" => wrap("p", node, out),
        "heading-1" => wrap("h1", node, out),
        "heading-2" => wrap("h2", node, out),
        "heading-3" => wrap("h3", node, out),
        "heading-4" => wrap("h4", node, out),
        "heading-5" => wrap("h5", node, out),
        "heading-6" => wrap("h6", node, out),
        "unordered-list" => wrap("ul", node, out),
        "ordered-list" => wrap("ol", node, out),
        "list-item" => wrap("li", node, out),
        "blockquote" => wrap("blockquote", node, out),
        "hr" => out.push_str("<hr/>"),
        "table" => {
            out.push_str("<table><tbody>");
            render_children(node, out);
            out.push_str("</tbody></table>");
        }
        "table-row" => wrap("tr", node, out),
        "table-cell" => wrap("td", node, out),
        "table-header-cell" => wrap("th", node, out),
        "text" => render_text(node, out),
        "hyperlink" => {
            let uri = node.data.get("uri").and_then(|u| u.as_str()).unwrap_or("#");
            out.push_str(&format!(r#"<a href="{}">"#, escape_html(uri)));
            render_children(node, out);
            out.push_str("</a>");
        }
        "asset-hyperlink" => match node.target().and_then(|t| Asset::parse(t).ok().flatten()) {
            Some(asset) => {
                out.push_str(&format!(r#"<a href="{}">"#, escape_html(&asset.url)));
                render_children(node, out);
                out.push_str("</a>");
            }
            None => render_children(node, out),
        },
        "entry-hyperlink" => match entry_slug(node) {
            Some(slug) => {
                out.push_str(&format!(r#"<a href="/{}/">"#, escape_html(slug)));
                render_children(node, out);
                out.push_str("</a>");
            }
            None => render_children(node, out),
        },
        "embedded-asset-block" => {
            if let Some(asset) = node.target().and_then(|t| Asset::parse(t).ok().flatten()) {
                render_asset(&asset, out);
            }
        }
        "embedded-entry-block" => {
            if let Some(title) = entry_title(node) {
                out.push_str(&format!(
                    r#"<div class="embedded-entry">{}</div>"#,
                    escape_html(title)
                ));
            }
        }
        "embedded-entry-inline" => {
            if let Some(title) = entry_title(node) {
                out.push_str(&format!(
                    r#"<span class="embedded-entry">{}</span>"#,
                    escape_html(title)
                ));
            }
        }
        _ => render_children(node, out),
    }
}

fn render_text(node: &Node, out: &mut String) {
    let mut html = escape_html(node.value.as_deref().unwrap_or(""));
    for mark in &node.marks {
        let tag = match mark.kind.as_str() {
            "bold" => "strong",
            "italic" => "em",
            "underline" => "u",
            "code" => "code",
            "superscript" => "sup",
            "subscript" => "sub",
            "strikethrough" => "s",
            _ => continue,
        };
        html = format!("<{tag}>{html}</{tag}>");
    }
    out.push_str(&html);
}

fn render_asset(asset: &Asset, out: &mut String) {
    let title = asset.title.as_deref().unwrap_or("");
    if asset.is_image() {
        let mut img = format!(
            r#"<img src="{}" alt="{}""#,
            escape_html(&asset.url),
            escape_html(asset.description.as_deref().unwrap_or(title))
        );
        if let (Some(w), Some(h)) = (asset.width, asset.height) {
            img.push_str(&format!(r#" width="{}" height="{}""#, w, h));
        }
        img.push_str("/>");
        out.push_str(&img);
    } else {
        let text = if title.is_empty() { &asset.url } else { title };
        out.push_str(&format!(
            r#"<a href="{}">{}</a>"#,
            escape_html(&asset.url),
            escape_html(text)
        ));
    }
}

fn entry_title(node: &Node) -> Option<&str> {
    node.target()?.get("fields")?.get("title")?.as_str()
}

fn entry_slug(node: &Node) -> Option<&str> {
    node.target()?
        .get("fields")?
        .get("slug")?
        .as_str()
        .filter(|s| !s.is_empty())
}

fn collect_text(node: &Node, out: &mut String) {
    if let Some(ref value) = node.value {
        out.push_str(value);
    }
    for child in &node.content {
        collect_text(child, out);
    }
    if matches!(
        node.node_type.as_str(),
        "paragraph" | "heading-1" | "heading-2" | "heading-3" | "list-item"
    ) && !out.ends_with(' ')
    {
        out.push(' ');
    }
}
