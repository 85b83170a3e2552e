//! 镜像引用解析
//!
//! 接受 `oci://`、`docker://` 前缀或裸引用，例如
//! `registry.redhat.io/rhelai1/modelcar-granite-7b-starter:1.4`。

use std::fmt;
use std::str::FromStr;

const SCHEMES: [&str; 2] = ["oci://", "docker://"];
const NAME_PREFIX: &str = "modelcar-";

/// 引用解析错误
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReferenceError {
    #[error("镜像引用为空")]
    Empty,

    #[error("仓库路径无效: {0}")]
    InvalidRepository(String),

    #[error("标签无效: {0}")]
    InvalidTag(String),

    #[error("摘要无效: {0}")]
    InvalidDigest(String),
}

/// 解析后的镜像引用
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageReference {
    pub registry: Option<String>,
    pub repository: String,
    pub tag: Option<String>,
    pub digest: Option<String>,
}

impl ImageReference {
    pub fn parse(raw: &str) -> Result<Self, ReferenceError> {
        let mut rest = raw.trim();
        for scheme in SCHEMES {
            if let Some(stripped) = rest.strip_prefix(scheme) {
                rest = stripped;
                break;
            }
        }
        if rest.is_empty() {
            return Err(ReferenceError::Empty);
        }

        let (rest, digest) = match rest.split_once('@') {
            Some((name, digest)) => {
                let valid = digest
                    .split_once(':')
                    .map(|(alg, hex)| {
                        !alg.is_empty() && !hex.is_empty() && hex.chars().all(|c| c.is_ascii_hexdigit())
                    })
                    .unwrap_or(false);
                if !valid {
                    return Err(ReferenceError::InvalidDigest(digest.to_string()));
                }
                (name, Some(digest.to_string()))
            }
            None => (rest, None),
        };

        // 最后一个 '/' 之后的 ':' 才是标签分隔符（前面的可能是端口）
        let last_slash = rest.rfind('/').map(|i| i + 1).unwrap_or(0);
        let (name, tag) = match rest[last_slash..].rfind(':') {
            Some(i) => {
                let split = last_slash + i;
                let tag = &rest[split + 1..];
                if tag.is_empty() || tag.len() > 128 || !tag.chars().all(is_tag_char) {
                    return Err(ReferenceError::InvalidTag(tag.to_string()));
                }
                (&rest[..split], Some(tag.to_string()))
            }
            None => (rest, None),
        };

        let (registry, repository) = match name.split_once('/') {
            Some((host, path)) if is_registry_host(host) => (Some(host.to_string()), path),
            _ => (None, name),
        };

        if repository.is_empty()
            || repository
                .split('/')
                .any(|segment| !is_path_segment(segment))
        {
            return Err(ReferenceError::InvalidRepository(repository.to_string()));
        }

        Ok(Self {
            registry,
            repository: repository.to_string(),
            tag,
            digest,
        })
    }

    /// 仓库路径的最后一段
    pub fn repository_name(&self) -> &str {
        self.repository
            .rsplit('/')
            .next()
            .unwrap_or(self.repository.as_str())
    }

    /// 推导模型名：去掉 `modelcar-` 前缀；共享仓库（如 `modelcar-catalog`）使用标签
    pub fn model_name(&self) -> Option<String> {
        let name = self.repository_name();
        let stripped = name.strip_prefix(NAME_PREFIX).unwrap_or(name);
        if stripped.is_empty() || stripped == "catalog" {
            return self.tag.clone();
        }
        Some(stripped.to_string())
    }

    /// 制品 URI
    pub fn artifact_uri(&self) -> String {
        format!("oci://{}", self)
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(registry) = &self.registry {
            write!(f, "{}/", registry)?;
        }
        write!(f, "{}", self.repository)?;
        if let Some(tag) = &self.tag {
            write!(f, ":{}", tag)?;
        }
        if let Some(digest) = &self.digest {
            write!(f, "@{}", digest)?;
        }
        Ok(())
    }
}

impl FromStr for ImageReference {
    type Err = ReferenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn is_registry_host(segment: &str) -> bool {
    if is_dot_segment(segment) {
        return false;
    }
    segment.contains('.') || segment.contains(':') || segment == "localhost"
}

/// `.` / `..` 之类的段会逃出布局根目录
fn is_dot_segment(segment: &str) -> bool {
    !segment.is_empty() && segment.chars().all(|c| c == '.')
}

fn is_path_segment(segment: &str) -> bool {
    !segment.is_empty() && !is_dot_segment(segment) && segment.chars().all(is_path_char)
}

fn is_tag_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-')
}

fn is_path_char(c: char) -> bool {
    c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '_' | '.' | '-')
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_parse_full_reference() {
        let reference =
            ImageReference::parse("oci://registry.redhat.io/rhelai1/modelcar-granite-7b-starter:1.4")
                .unwrap();
        assert_eq!(reference.registry.as_deref(), Some("registry.redhat.io"));
        assert_eq!(reference.repository, "rhelai1/modelcar-granite-7b-starter");
        assert_eq!(reference.tag.as_deref(), Some("1.4"));
        assert_eq!(reference.model_name().as_deref(), Some("granite-7b-starter"));
        assert_eq!(
            reference.artifact_uri(),
            "oci://registry.redhat.io/rhelai1/modelcar-granite-7b-starter:1.4"
        );
    }

    #[test]
    fn test_registry_port_is_not_a_tag() {
        let reference = ImageReference::parse("localhost:5000/models/phi").unwrap();
        assert_eq!(reference.registry.as_deref(), Some("localhost:5000"));
        assert_eq!(reference.repository, "models/phi");
        assert_eq!(reference.tag, None);
    }

    #[test]
    fn test_shared_catalog_repository_uses_tag() {
        let reference =
            ImageReference::parse("quay.io/redhat-ai-services/modelcar-catalog:granite-3.1-8b")
                .unwrap();
        assert_eq!(reference.model_name().as_deref(), Some("granite-3.1-8b"));
    }

    #[test]
    fn test_digest_reference() {
        let reference = ImageReference::parse("docker://quay.io/a/b@sha256:abcdef01").unwrap();
        assert_eq!(reference.digest.as_deref(), Some("sha256:abcdef01"));
        assert_eq!(reference.to_string(), "quay.io/a/b@sha256:abcdef01");
    }

    #[rstest]
    #[case("", ReferenceError::Empty)]
    #[case("oci://", ReferenceError::Empty)]
    #[case("quay.io/a/b:", ReferenceError::InvalidTag(String::new()))]
    #[case("quay.io/a/b@sha256:zz", ReferenceError::InvalidDigest("sha256:zz".into()))]
    #[case("quay.io/A/b", ReferenceError::InvalidRepository("A/b".into()))]
    #[case("quay.io//b", ReferenceError::InvalidRepository("/b".into()))]
    #[case("quay.io/../../x:1", ReferenceError::InvalidRepository("../../x".into()))]
    #[case("../x:1", ReferenceError::InvalidRepository("../x".into()))]
    #[case("quay.io/rh/./b", ReferenceError::InvalidRepository("rh/./b".into()))]
    fn test_invalid_references(#[case] raw: &str, #[case] expected: ReferenceError) {
        assert_eq!(ImageReference::parse(raw), Err(expected));
    }
}
