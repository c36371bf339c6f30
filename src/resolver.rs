//! URI Resolver (C3): translates a request URI into a validated filesystem
//! path under the document root, a userdir, or the CGI root.
//!
//! Percent-decoding and slash-collapsing are deliberately *not* done here —
//! `spec.md` doesn't call for either, and the original C server
//! (`examples/original_source/sws.c`) doesn't do them either. URI bytes are
//! turned into path components with `OsStr::from_bytes`, the same
//! unix-specific idiom the teacher uses in `server/static_files.rs`.

use std::ffi::OsStr;
use std::fs::{self, Metadata};
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

/// The fixed per-user subdirectory `/~user` requests are served from.
pub const USERDIR_SUBDIR: &str = "sws";

/// Generous bound on a `/~username` token; real usernames are far shorter,
/// this just keeps a malicious URI from making us format an enormous
/// string before the `getpwnam` lookup fails anyway.
const MAX_USERNAME_LEN: usize = 255;

#[derive(Debug)]
pub struct Resolved {
    pub outpath: PathBuf,
    pub meta: Option<Metadata>,
    pub exists: bool,
    pub is_dir: bool,
    pub needs_trailing_slash: bool,
    pub is_cgi: bool,
}

#[derive(Debug)]
pub enum ResolveFailure {
    Forbidden,
    Other(io::Error),
}

impl From<io::Error> for ResolveFailure {
    fn from(e: io::Error) -> Self {
        ResolveFailure::Other(e)
    }
}

/// Resolves `uri` against `realroot` (the document root, already
/// canonicalized once at startup — see `config::Config::load`) and,
/// when configured, `cgidir`.
pub fn resolve(
    realroot: &Path,
    cgidir: Option<&Path>,
    uri: &[u8],
) -> Result<Resolved, ResolveFailure> {
    if contains_dotdot(uri) {
        return Err(ResolveFailure::Forbidden);
    }

    if let Some(cgidir) = cgidir {
        if uri.starts_with(b"/cgi-bin") {
            return resolve_cgi(cgidir, uri);
        }
    }

    if uri.starts_with(b"/~") {
        return resolve_userdir(uri);
    }

    if !uri.starts_with(b"/") {
        return Err(ResolveFailure::Forbidden);
    }

    let candidate = realroot.join(OsStr::from_bytes(&uri[1..]));
    finish(candidate, realroot, uri.ends_with(b"/"))
}

fn contains_dotdot(uri: &[u8]) -> bool {
    uri.windows(2).any(|w| w == b"..")
}

/// Splits a URI (or remainder of one) at the first `?`, returning
/// `(path, query)`. `query` excludes the `?` itself.
pub fn split_query(uri: &[u8]) -> (&[u8], &[u8]) {
    match uri.iter().position(|&b| b == b'?') {
        Some(i) => (&uri[..i], &uri[i + 1..]),
        None => (uri, b""),
    }
}

/// Shared tail of the docroot and userdir branches: attempt to
/// canonicalize, enforce the boundary check, then apply the
/// directory/index-file rules.
fn finish(
    candidate: PathBuf,
    boundary_root: &Path,
    uri_ends_with_slash: bool,
) -> Result<Resolved, ResolveFailure> {
    let canon = match fs::canonicalize(&candidate) {
        Ok(c) => c,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Ok(Resolved {
                outpath: candidate,
                meta: None,
                exists: false,
                is_dir: false,
                needs_trailing_slash: false,
                is_cgi: false,
            });
        }
        Err(e) => return Err(ResolveFailure::Other(e)),
    };

    // Canonicalization resolves symlinks; this is the actual safeguard
    // against serving outside the root, not the `..`-substring check above.
    if !canon.starts_with(boundary_root) {
        return Err(ResolveFailure::Forbidden);
    }

    let meta = fs::metadata(&canon)?;

    if meta.is_dir() {
        if !uri_ends_with_slash {
            return Ok(Resolved {
                outpath: canon,
                meta: Some(meta),
                exists: true,
                is_dir: true,
                needs_trailing_slash: true,
                is_cgi: false,
            });
        }

        let index = canon.join("index.html");
        if let Ok(index_meta) = fs::metadata(&index) {
            if index_meta.is_file() {
                return Ok(Resolved {
                    outpath: index,
                    meta: Some(index_meta),
                    exists: true,
                    is_dir: false,
                    needs_trailing_slash: false,
                    is_cgi: false,
                });
            }
        }

        return Ok(Resolved {
            outpath: canon,
            meta: Some(meta),
            exists: true,
            is_dir: true,
            needs_trailing_slash: false,
            is_cgi: false,
        });
    }

    Ok(Resolved {
        outpath: canon,
        meta: Some(meta),
        exists: true,
        is_dir: false,
        needs_trailing_slash: false,
        is_cgi: false,
    })
}

fn resolve_userdir(uri: &[u8]) -> Result<Resolved, ResolveFailure> {
    let after_tilde = &uri[2..];
    let name_end = after_tilde
        .iter()
        .position(|&b| b == b'/')
        .unwrap_or(after_tilde.len());

    if name_end == 0 || name_end > MAX_USERNAME_LEN {
        return Err(ResolveFailure::Forbidden);
    }

    let username =
        std::str::from_utf8(&after_tilde[..name_end]).map_err(|_| ResolveFailure::Forbidden)?;
    let remainder = &after_tilde[name_end..];

    let user = nix::unistd::User::from_name(username)
        .map_err(|_| ResolveFailure::Forbidden)?
        .ok_or(ResolveFailure::Forbidden)?;

    let mut userroot = user.dir;
    userroot.push(USERDIR_SUBDIR);

    // A missing or inaccessible userdir can't have its boundary verified;
    // fail closed rather than leak whether the directory exists.
    let realroot = fs::canonicalize(&userroot).map_err(|_| ResolveFailure::Forbidden)?;

    let candidate = if remainder.is_empty() {
        userroot
    } else {
        userroot.join(OsStr::from_bytes(&remainder[1..]))
    };

    finish(candidate, &realroot, uri.ends_with(b"/"))
}

fn resolve_cgi(cgidir: &Path, uri: &[u8]) -> Result<Resolved, ResolveFailure> {
    let after = &uri[b"/cgi-bin".len()..];
    let (path_part, _query) = split_query(after);

    let candidate = if path_part.is_empty() {
        cgidir.to_path_buf()
    } else {
        let stripped = path_part.strip_prefix(b"/").unwrap_or(path_part);
        cgidir.join(OsStr::from_bytes(stripped))
    };

    let outpath = fs::canonicalize(&candidate).unwrap_or(candidate);
    let meta = fs::metadata(&outpath).ok();
    let exists = meta.is_some();
    let is_dir = meta.as_ref().map(Metadata::is_dir).unwrap_or(false);

    Ok(Resolved {
        outpath,
        meta,
        exists,
        is_dir,
        needs_trailing_slash: false,
        is_cgi: true,
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use std::fs::{create_dir, File};
    use std::io::Write;

    fn tempdir() -> tempfile::TempDir {
        tempfile::tempdir().unwrap()
    }

    #[test]
    fn rejects_dotdot_anywhere() {
        let dir = tempdir();
        let root = fs::canonicalize(dir.path()).unwrap();
        let err = resolve(&root, None, b"/../etc/passwd").unwrap_err();
        assert!(matches!(err, ResolveFailure::Forbidden));
    }

    #[test]
    fn serves_existing_file() {
        let dir = tempdir();
        let root = fs::canonicalize(dir.path()).unwrap();
        File::create(dir.path().join("hi.txt")).unwrap().write_all(b"hi\n").unwrap();

        let r = resolve(&root, None, b"/hi.txt").unwrap();
        assert!(r.exists);
        assert!(!r.is_dir);
        assert_eq!(r.outpath, root.join("hi.txt"));
    }

    #[test]
    fn missing_file_is_not_an_error() {
        let dir = tempdir();
        let root = fs::canonicalize(dir.path()).unwrap();
        let r = resolve(&root, None, b"/nope.txt").unwrap();
        assert!(!r.exists);
    }

    #[test]
    fn directory_without_trailing_slash_needs_one() {
        let dir = tempdir();
        let root = fs::canonicalize(dir.path()).unwrap();
        create_dir(dir.path().join("sub")).unwrap();

        let r = resolve(&root, None, b"/sub").unwrap();
        assert!(r.needs_trailing_slash);
        assert!(r.is_dir);
    }

    #[test]
    fn directory_with_index_rewrites_to_it() {
        let dir = tempdir();
        let root = fs::canonicalize(dir.path()).unwrap();
        create_dir(dir.path().join("sub")).unwrap();
        File::create(dir.path().join("sub/index.html")).unwrap();

        let r = resolve(&root, None, b"/sub/").unwrap();
        assert!(!r.is_dir);
        assert_eq!(r.outpath, root.join("sub/index.html"));
    }

    #[test]
    fn directory_without_index_lists() {
        let dir = tempdir();
        let root = fs::canonicalize(dir.path()).unwrap();
        create_dir(dir.path().join("sub")).unwrap();

        let r = resolve(&root, None, b"/sub/").unwrap();
        assert!(r.is_dir);
        assert!(!r.needs_trailing_slash);
    }

    #[test]
    fn symlink_escaping_root_is_forbidden() {
        let dir = tempdir();
        let outside = tempdir();
        File::create(outside.path().join("secret.txt")).unwrap();
        let root = fs::canonicalize(dir.path()).unwrap();

        #[cfg(unix)]
        std::os::unix::fs::symlink(outside.path(), dir.path().join("escape")).unwrap();

        let err = resolve(&root, None, b"/escape/secret.txt").unwrap_err();
        assert!(matches!(err, ResolveFailure::Forbidden));
    }

    #[test]
    fn cgi_routes_are_recognized() {
        let dir = tempdir();
        let root = fs::canonicalize(dir.path()).unwrap();
        let cgidir = tempdir();
        File::create(cgidir.path().join("echo")).unwrap();

        let r = resolve(&root, Some(cgidir.path()), b"/cgi-bin/echo?x=1").unwrap();
        assert!(r.is_cgi);
        assert!(r.exists);
    }

    #[test]
    fn split_query_splits_on_first_question_mark() {
        assert_eq!(split_query(b"/a?b=1&c=2"), (&b"/a"[..], &b"b=1&c=2"[..]));
        assert_eq!(split_query(b"/a"), (&b"/a"[..], &b""[..]));
    }
}
