//! Field extraction from `ext_emconf.php`.
//!
//! The file is PHP source assigning an array literal. Only two scalar
//! entries are needed, so it is scraped as text rather than evaluated.

use regex::Regex;
use std::sync::LazyLock;

pub const EMCONF_FILE: &str = "ext_emconf.php";

static VERSION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"['"]version['"]\s*=>\s*(?:'((?:[^'\\]|\\.)*)'|"((?:[^"\\]|\\.)*)")"#)
        .expect("valid version pattern")
});

static CHECKSUMS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"['"]_md5_values_when_last_written['"]\s*=>\s*(?:'((?:[^'\\]|\\.)*)'|"((?:[^"\\]|\\.)*)")"#,
    )
    .expect("valid checksum pattern")
});

/// The recognised fields of one metadata file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmConf {
    pub version: Option<String>,
    /// Serialized `path => checksum` array, still encoded.
    pub checksums: Option<String>,
}

pub fn parse_emconf(content: &str) -> EmConf {
    EmConf {
        version: first_literal(&VERSION_RE, content),
        checksums: first_literal(&CHECKSUMS_RE, content).filter(|s| !s.is_empty()),
    }
}

fn first_literal(re: &Regex, content: &str) -> Option<String> {
    let caps = re.captures(content)?;
    if let Some(single) = caps.get(1) {
        return Some(unescape_single_quoted(single.as_str()));
    }
    caps.get(2).map(|m| unescape_double_quoted(m.as_str()))
}

/// In single-quoted PHP strings only `\'` and `\\` are escapes.
fn unescape_single_quoted(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(&next @ ('\'' | '\\')) = chars.peek() {
                out.push(next);
                chars.next();
                continue;
            }
        }
        out.push(c);
    }
    out
}

fn unescape_double_quoted(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.peek() {
                Some(&next @ ('"' | '\\' | '$')) => {
                    out.push(next);
                    chars.next();
                    continue;
                }
                Some('n') => {
                    out.push('\n');
                    chars.next();
                    continue;
                }
                Some('t') => {
                    out.push('\t');
                    chars.next();
                    continue;
                }
                _ => {}
            }
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const EMCONF: &str = r#"<?php

########################################################################
# Extension Manager/Repository config file for ext "news".
########################################################################

$EM_CONF[$_EXTKEY] = array(
	'title' => 'News system',
	'category' => 'fe',
	'state' => 'stable',
	'version' => '2.3.0',
	'constraints' => array(
		'depends' => array(
			'typo3' => '4.5.0-6.2.99',
		),
	),
	'_md5_values_when_last_written' => 'a:2:{s:9:"ChangeLog";s:4:"4e2b";s:12:"ext_icon.gif";s:4:"1bdc";}',
);
"#;

    #[test]
    fn test_parse_classic_emconf() {
        let conf = parse_emconf(EMCONF);

        assert_eq!(conf.version.as_deref(), Some("2.3.0"));
        assert_eq!(
            conf.checksums.as_deref(),
            Some(r#"a:2:{s:9:"ChangeLog";s:4:"4e2b";s:12:"ext_icon.gif";s:4:"1bdc";}"#)
        );
    }

    #[test]
    fn test_parse_short_array_double_quotes() {
        let conf = parse_emconf(
            r#"<?php $EM_CONF[$_EXTKEY] = ["title" => "SEO", "version" => "11.0.3"];"#,
        );

        assert_eq!(conf.version.as_deref(), Some("11.0.3"));
        assert_eq!(conf.checksums, None);
    }

    #[test]
    fn test_missing_fields() {
        let conf = parse_emconf("<?php $EM_CONF[$_EXTKEY] = array('title' => 'x');");
        assert_eq!(conf, EmConf::default());

        let conf = parse_emconf("<?php $EM_CONF[$_EXTKEY] = array('version' => '1.0.0', '_md5_values_when_last_written' => '');");
        assert_eq!(conf.version.as_deref(), Some("1.0.0"));
        assert_eq!(conf.checksums, None);
    }

    #[test]
    fn test_single_quote_escapes() {
        let conf = parse_emconf(
            r#"'_md5_values_when_last_written' => 'a:1:{s:7:"it\'s.md";s:4:"abcd";}'"#,
        );
        assert_eq!(
            conf.checksums.as_deref(),
            Some(r#"a:1:{s:7:"it's.md";s:4:"abcd";}"#)
        );
    }
}
