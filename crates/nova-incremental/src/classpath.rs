use std::collections::{BTreeSet, HashMap};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ClasspathEntry {
    ClassDir(PathBuf),
    Jar(PathBuf),
}

impl ClasspathEntry {
    /// `.jar` and `.zip` files are archives; anything else is a class directory.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let is_archive = path
            .extension()
            .and_then(OsStr::to_str)
            .is_some_and(|ext| ext.eq_ignore_ascii_case("jar") || ext.eq_ignore_ascii_case("zip"));
        if is_archive {
            ClasspathEntry::Jar(path)
        } else {
            ClasspathEntry::ClassDir(path)
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            ClasspathEntry::ClassDir(p) | ClasspathEntry::Jar(p) => p,
        }
    }

    /// The binary a compiler reports when it loads `class_name` from this entry.
    ///
    /// `dir/pkg/Name.class` for a class directory, the archive itself for a jar.
    pub fn resolve(&self, class_name: &str) -> PathBuf {
        match self {
            ClasspathEntry::ClassDir(dir) => dir.join(class_file_name(class_name)),
            ClasspathEntry::Jar(path) => path.clone(),
        }
    }
}

/// `pkg.Outer$Inner` -> `pkg/Outer$Inner.class`.
pub fn class_file_name(class_name: &str) -> String {
    format!("{}.class", class_name.replace('.', "/"))
}

/// Finds which search-classpath entry defines a class.
///
/// Archive listings are read once per locator and cached. Unreadable archives
/// define nothing.
#[derive(Debug)]
pub struct ClasspathLocator {
    entries: Vec<ClasspathEntry>,
    jar_listings: Mutex<HashMap<PathBuf, Arc<BTreeSet<String>>>>,
}

impl ClasspathLocator {
    pub fn new(search_classpath: &[PathBuf]) -> Self {
        Self {
            entries: search_classpath
                .iter()
                .cloned()
                .map(ClasspathEntry::from_path)
                .collect(),
            jar_listings: Mutex::new(HashMap::new()),
        }
    }

    /// First entry, in search order, that defines `class_name`.
    pub fn entry_for(&self, class_name: &str) -> Option<&ClasspathEntry> {
        let file_name = class_file_name(class_name);
        self.entries.iter().find(|entry| match entry {
            ClasspathEntry::ClassDir(dir) => dir.join(&file_name).is_file(),
            ClasspathEntry::Jar(path) => self.jar_listing(path).contains(&file_name),
        })
    }

    fn jar_listing(&self, path: &Path) -> Arc<BTreeSet<String>> {
        let mut listings = self
            .jar_listings
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(listing) = listings.get(path) {
            return listing.clone();
        }

        let listing = match read_jar_listing(path) {
            Ok(listing) => listing,
            Err(err) => {
                tracing::debug!(
                    target: "nova.incremental",
                    path = %path.display(),
                    error = %err,
                    "failed to read classpath archive; treating it as empty"
                );
                BTreeSet::new()
            }
        };
        let listing = Arc::new(listing);
        listings.insert(path.to_path_buf(), listing.clone());
        listing
    }
}

fn read_jar_listing(path: &Path) -> Result<BTreeSet<String>, zip::result::ZipError> {
    let file = std::fs::File::open(path)?;
    let mut archive = zip::ZipArchive::new(file)?;
    let mut out = BTreeSet::new();
    for i in 0..archive.len() {
        let entry = archive.by_index(i)?;
        if entry.is_file() && entry.name().ends_with(".class") {
            out.insert(entry.name().to_owned());
        }
    }
    Ok(out)
}

/// Boot classpath entries given explicitly in compiler options.
///
/// Recognizes `-bootclasspath <path>`, `--boot-class-path <path>` and
/// `--boot-class-path=<path>`. Values are split on the platform path separator.
pub fn explicit_boot_classpath(options: &[String]) -> Vec<PathBuf> {
    let mut out = Vec::new();
    let mut iter = options.iter();
    while let Some(option) = iter.next() {
        let value = match option.as_str() {
            "-bootclasspath" | "--boot-class-path" => iter.next().map(String::as_str),
            other => other.strip_prefix("--boot-class-path="),
        };
        if let Some(value) = value {
            out.extend(std::env::split_paths(value).filter(|p| !p.as_os_str().is_empty()));
        }
    }
    out
}
