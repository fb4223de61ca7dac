use crate::entity::{FileArena, FileEntity, FileId};
use crate::error::{Error, ErrorKind, Result};
use regex::Regex;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::LazyLock;
use time::UtcDateTime;

const PACKAGE_EXTENSION: &str = ".var";
const LATEST: &str = "latest";

// The name is lazy so that a trailing numeric/latest segment is always taken
// as the version, and dotted names (`Author.Some.Name.3`) still parse.
static PACKAGE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?P<author>[^./:\s]+)\.(?P<name>[^/:\s]+?)(?:\.(?P<version>\d+|latest))?$").unwrap()
});

/// Version part of a [`PackageName`].
///
/// `Latest` is the unversioned wildcard and is persisted as `-1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PackageVersion {
    Latest,
    Exact(u32),
}
impl PackageVersion {
    pub fn as_i64(&self) -> i64 {
        match self {
            Self::Latest => -1,
            Self::Exact(version) => i64::from(*version),
        }
    }

    pub fn from_i64(value: i64) -> Self {
        u32::try_from(value).map(Self::Exact).unwrap_or(Self::Latest)
    }
}
impl Display for PackageVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Latest => write!(f, "{LATEST}"),
            Self::Exact(version) => write!(f, "{version}"),
        }
    }
}

/// Parsed `<author>.<name>.<version>` identity of a `.var` package.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PackageName {
    pub author: String,
    pub name: String,
    pub version: PackageVersion,
}
impl PackageName {
    pub fn new(author: impl Into<String>, name: impl Into<String>, version: PackageVersion) -> Self {
        Self { author: author.into(), name: name.into(), version }
    }

    /// Parse a package archive file name such as `Author.Name.12.var`.
    ///
    /// Any leading directories are ignored.
    pub fn from_filename(filename: impl AsRef<str>) -> Result<Self> {
        let filename = crate::path::file_name(filename.as_ref());
        let token = match filename.len().checked_sub(PACKAGE_EXTENSION.len()) {
            Some(idx) if filename.is_char_boundary(idx) && filename[idx..].eq_ignore_ascii_case(PACKAGE_EXTENSION) => {
                &filename[..idx]
            },
            _ => filename,
        };
        token.parse()
    }

    /// Reconstructs the archive file name, `Author.Name.<version|latest>.var`.
    pub fn filename(&self) -> String {
        format!("{self}{PACKAGE_EXTENSION}")
    }

    /// Author and name are equal (case-insensitive) and the versions are
    /// either equal or one of them is [`PackageVersion::Latest`].
    pub fn matches(&self, other: &PackageName) -> bool {
        self.author.eq_ignore_ascii_case(&other.author)
            && self.name.eq_ignore_ascii_case(&other.name)
            && match (self.version, other.version) {
                (PackageVersion::Latest, _) | (_, PackageVersion::Latest) => true,
                (a, b) => a == b,
            }
    }
}
impl FromStr for PackageName {
    type Err = Error;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let Some(captures) = PACKAGE_NAME.captures(s) else {
            exn::bail!(ErrorKind::InvalidPackageName(s.to_string()));
        };
        let version = match captures.name("version").map(|m| m.as_str()) {
            None => PackageVersion::Latest,
            Some(v) if v.eq_ignore_ascii_case(LATEST) => PackageVersion::Latest,
            Some(v) => match v.parse::<u32>() {
                Ok(version) => PackageVersion::Exact(version),
                Err(_) => exn::bail!(ErrorKind::InvalidPackageName(s.to_string())),
            },
        };
        Ok(Self {
            author: captures["author"].to_string(),
            name: captures["name"].to_string(),
            version,
        })
    }
}
impl Display for PackageName {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}.{}.{}", self.author, self.name, self.version)
    }
}

/// A `.var` archive and every file it contains.
///
/// Membership is unique per case-insensitive local path, which the inner
/// [`FileArena`] enforces.
#[derive(Debug, Clone)]
pub struct Package {
    pub name: PackageName,
    full_path: PathBuf,
    /// Set when the package on disk is a symbolic link.
    link_target: Option<PathBuf>,
    files: FileArena,
}
impl Package {
    pub fn new(name: PackageName, full_path: impl Into<PathBuf>) -> Self {
        Self {
            name,
            full_path: full_path.into(),
            link_target: None,
            files: FileArena::default(),
        }
    }

    /// Builds a package whose name is parsed from the archive file name.
    pub fn from_path(full_path: impl Into<PathBuf>) -> Result<Self> {
        let full_path = full_path.into();
        let filename = full_path.file_name().and_then(|f| f.to_str()).unwrap_or_default();
        let name = PackageName::from_filename(filename)?;
        Ok(Self::new(name, full_path))
    }

    pub fn with_link_target(mut self, target: impl Into<PathBuf>) -> Self {
        self.link_target = Some(target.into());
        self
    }

    pub fn full_path(&self) -> &Path {
        &self.full_path
    }

    /// Path used as the package's cache identity: the link target for soft
    /// links, otherwise the package's own path.
    pub fn identity_path(&self) -> &Path {
        self.link_target.as_deref().unwrap_or(&self.full_path)
    }

    pub fn is_link(&self) -> bool {
        self.link_target.is_some()
    }

    /// Adds a member file at `local_path` inside the archive.
    pub fn add_file(&mut self, local_path: impl AsRef<str>, size: u64, modified: UtcDateTime) -> Result<FileId> {
        let file = FileEntity::packaged(self.name.clone(), local_path, size, modified);
        self.files.insert(file)
    }

    pub fn files(&self) -> &FileArena {
        &self.files
    }

    pub fn files_mut(&mut self) -> &mut FileArena {
        &mut self.files
    }

    /// Total size of every member file.
    pub fn size(&self) -> u64 {
        self.files.iter().map(|(_, file)| file.size()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("JaxZoa.JaxEffects.latest", "JaxZoa", "JaxEffects", PackageVersion::Latest)]
    #[case("JaxZoa.JaxEffects.LATEST", "JaxZoa", "JaxEffects", PackageVersion::Latest)]
    #[case("Author.Name.12", "Author", "Name", PackageVersion::Exact(12))]
    #[case("Author.Some.Name.3", "Author", "Some.Name", PackageVersion::Exact(3))]
    #[case("a.1", "a", "1", PackageVersion::Latest)]
    fn test_parse(#[case] input: &str, #[case] author: &str, #[case] name: &str, #[case] version: PackageVersion) {
        let parsed: PackageName = input.parse().unwrap();
        assert_eq!(parsed, PackageName::new(author, name, version));
    }

    #[rstest]
    #[case("NoDots")]
    #[case("Custom/a.png")]
    #[case("clothing:Author.Name.1")]
    #[case("has space.name.1")]
    #[case("")]
    fn test_parse_invalid(#[case] input: &str) {
        assert!(input.parse::<PackageName>().is_err());
    }

    #[test]
    fn test_filename_round_trip() {
        let name = PackageName::from_filename("/vam/AddonPackages/Author.Name.7.var").unwrap();
        assert_eq!(name.version, PackageVersion::Exact(7));
        assert_eq!(name.filename(), "Author.Name.7.var");
        let latest: PackageName = "JaxZoa.JaxEffects.latest".parse().unwrap();
        assert_eq!(latest.filename(), "JaxZoa.JaxEffects.latest.var");
    }

    #[test]
    fn test_version_storage() {
        assert_eq!(PackageVersion::Latest.as_i64(), -1);
        assert_eq!(PackageVersion::from_i64(-1), PackageVersion::Latest);
        assert_eq!(PackageVersion::from_i64(4), PackageVersion::Exact(4));
    }

    #[test]
    fn test_matches() {
        let exact: PackageName = "Author.Name.3".parse().unwrap();
        let latest: PackageName = "author.name.latest".parse().unwrap();
        let other: PackageName = "Author.Name.4".parse().unwrap();
        assert!(exact.matches(&latest));
        assert!(latest.matches(&other));
        assert!(!exact.matches(&other));
    }

    #[test]
    fn test_package_identity_and_size() {
        let mut package = Package::from_path("/vam/AddonPackages/Author.Name.1.var").unwrap();
        assert_eq!(package.identity_path(), Path::new("/vam/AddonPackages/Author.Name.1.var"));
        package.add_file("Custom/a.vam", 10, UtcDateTime::UNIX_EPOCH).unwrap();
        package.add_file("Custom/a.vaj", 5, UtcDateTime::UNIX_EPOCH).unwrap();
        assert!(package.add_file("custom/A.VAM", 1, UtcDateTime::UNIX_EPOCH).is_err());
        assert_eq!(package.size(), 15);
        let linked = package.with_link_target("/store/Author.Name.1.var");
        assert!(linked.is_link());
        assert_eq!(linked.identity_path(), Path::new("/store/Author.Name.1.var"));
    }
}
