use chrono::Utc;

use crate::custom_date::format_rfc822;
use crate::model::Article;

pub fn escape_xml(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn render_item(article: &Article) -> String {
    let pub_date = article
        .published_at
        .map(|dt| format!("\n            <pubDate>{}</pubDate>", format_rfc822(dt)))
        .unwrap_or_default();
    let category = article
        .category
        .map(|c| format!("\n            <category>{}</category>", c.display_name()))
        .unwrap_or_default();
    let author = if article.author.is_empty() {
        String::new()
    } else {
        format!("\n            <dc:creator>{}</dc:creator>", escape_xml(&article.author))
    };
    let image = if article.image_url.is_empty() {
        String::new()
    } else {
        format!(
            "\n            <enclosure url=\"{}\" length=\"0\" type=\"image/jpeg\"/>",
            escape_xml(&article.image_url)
        )
    };

    format!(
        r#"<item>
            <title>{title}</title>
            <link>{link}</link>
            <description>{description}</description>
            <guid isPermaLink="false">{id}</guid>
            <source url="{link}">{source}</source>{author}{category}{pub_date}{image}
        </item>
        "#,
        title = escape_xml(&article.title),
        link = escape_xml(&article.url),
        description = escape_xml(&article.description),
        id = escape_xml(&article.id),
        source = escape_xml(&article.source),
        author = author,
        category = category,
        pub_date = pub_date,
        image = image,
    )
}

/// Renders a list of articles as an RSS 2.0 channel.
pub fn render_rss(title: &str, link: &str, articles: &[Article]) -> String {
    let build_date = format_rfc822(Utc::now());
    let items: String = articles.iter().map(render_item).collect();

    let app_name = env!("CARGO_PKG_NAME");
    let app_version = env!("CARGO_PKG_VERSION");

    format!(
        r#"<?xml version='1.0' encoding='UTF-8'?>
<rss xmlns:atom="http://www.w3.org/2005/Atom" xmlns:dc="http://purl.org/dc/elements/1.1/" version="2.0">
<channel>
    <title>{title}</title>
    <link>{link}</link>
    <description>{title}</description>
    <lastBuildDate>{build_date}</lastBuildDate>
    <generator>{app_name} v{app_version}</generator>
    <docs>http://www.rssboard.org/rss-specification</docs>
    {items}
</channel>
</rss>"#,
        title = escape_xml(title),
        link = escape_xml(link),
        build_date = build_date,
        app_name = app_name,
        app_version = app_version,
        items = items,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Category;
    use chrono::TimeZone;

    fn article() -> Article {
        Article {
            id: "42".into(),
            title: "Fish & Chips <review>".into(),
            description: "\"Best\" in town".into(),
            content: String::new(),
            author: "O'Brien".into(),
            url: "https://food.test/a?x=1&y=2".into(),
            image_url: String::new(),
            published_at: Some(Utc.with_ymd_and_hms(2024, 5, 1, 8, 30, 0).unwrap()),
            source: "Food Weekly".into(),
            category: Some(Category::Entertainment),
        }
    }

    #[test]
    fn escapes_markup() {
        assert_eq!(escape_xml("a<b>&\"c'"), "a&lt;b&gt;&amp;&quot;c&apos;");
    }

    #[test]
    fn renders_items() {
        let rss = render_rss("Top headlines", "https://newsapi.org", &[article()]);

        assert!(rss.starts_with("<?xml"));
        assert!(rss.contains("<title>Fish &amp; Chips &lt;review&gt;</title>"));
        assert!(rss.contains("<link>https://food.test/a?x=1&amp;y=2</link>"));
        assert!(rss.contains("<dc:creator>O&apos;Brien</dc:creator>"));
        assert!(rss.contains("<category>Entertainment</category>"));
        assert!(rss.contains("<pubDate>Wed, 01 May 2024 08:30:00 +0000</pubDate>"));
        assert!(!rss.contains("<enclosure"));
        assert_eq!(rss.matches("<item>").count(), 1);
    }

    #[test]
    fn renders_empty_channel() {
        let rss = render_rss("Nothing", "https://newsapi.org", &[]);
        assert!(rss.contains("<channel>"));
        assert!(!rss.contains("<item>"));
    }
}
