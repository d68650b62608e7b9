//! Copr project addressing
//!
//! Copr serves the monitor dashboard and build pages from the frontend and
//! the build results (index pages and logs) from the backend. Group projects
//! are spelled `@group` on the backend and `g/group` on the frontend.

use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};

/// Default Copr frontend
pub const COPR_FRONTEND: &str = "https://copr.fedorainfracloud.org";

/// Default Copr backend (build results)
pub const COPR_BACKEND: &str = "https://copr-be.cloud.fedoraproject.org";

/// Marker of one produced file row in a result-directory index page
pub const RPM_FILE_ROW: &str = "<td class='t'>RPM File</td>";

/// Log files kept in every build result directory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildLog {
    /// rpmbuild output
    Build,
    /// the builder's live stream of the whole build
    Live,
}

impl BuildLog {
    pub fn file_name(&self) -> &'static str {
        match self {
            BuildLog::Build => "build.log.gz",
            BuildLog::Live => "builder-live.log.gz",
        }
    }
}

/// A Copr project and the chroot whose results are inspected
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoprProject {
    /// Owner, `@group` for group projects
    pub owner: String,
    /// Project name
    pub name: String,
    /// Chroot, e.g. `fedora-rawhide-x86_64`
    pub chroot: String,
    /// Frontend base URL
    #[serde(default = "default_frontend")]
    pub frontend: String,
    /// Backend base URL
    #[serde(default = "default_backend")]
    pub backend: String,
}

fn default_frontend() -> String {
    COPR_FRONTEND.to_string()
}

fn default_backend() -> String {
    COPR_BACKEND.to_string()
}

impl CoprProject {
    /// Create a project on the public Fedora Copr instance
    pub fn new(owner: &str, name: &str, chroot: &str) -> Self {
        CoprProject {
            owner: owner.to_string(),
            name: name.to_string(),
            chroot: chroot.to_string(),
            frontend: default_frontend(),
            backend: default_backend(),
        }
    }

    /// Path segment used by frontend URLs: `g/python/python3.8`
    pub fn frontend_path(&self) -> String {
        match self.owner.strip_prefix('@') {
            Some(group) => format!("g/{}/{}", group, self.name),
            None => format!("{}/{}", self.owner, self.name),
        }
    }

    /// The monitor dashboard listing the latest build of every package
    pub fn monitor_url(&self) -> String {
        format!("{}/coprs/{}/monitor/", self.frontend, self.frontend_path())
    }

    /// Frontend page of one build
    pub fn build_url(&self, build_id: u64) -> String {
        format!(
            "{}/coprs/{}/build/{}/",
            self.frontend,
            self.frontend_path(),
            build_id
        )
    }

    /// Result directory of one build, always with the trailing slash
    pub fn result_dir_url(&self, package: &str, build_id: u64) -> String {
        format!(
            "{}/results/{}/{}/{}/{:08}-{}/",
            self.backend, self.owner, self.name, self.chroot, build_id, package
        )
    }

    pub fn log_url(&self, package: &str, build_id: u64, log: BuildLog) -> String {
        format!(
            "{}{}",
            self.result_dir_url(package, build_id),
            log.file_name()
        )
    }
}

/// Decode a package name as it appears in a dashboard link (`libsigc%2B%2B`).
pub fn decode_package_name(raw: &str) -> String {
    percent_decode_str(raw).decode_utf8_lossy().into_owned()
}

/// Number of produced files listed on a result-directory index page.
///
/// A failed build lists only its SRPM; anything more means binary RPMs were
/// produced even though the dashboard says the build failed.
pub fn produced_file_count(index_html: &str) -> usize {
    index_html.matches(RPM_FILE_ROW).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn python38() -> CoprProject {
        CoprProject::new("@python", "python3.8", "fedora-rawhide-x86_64")
    }

    #[test]
    fn test_group_project_urls() {
        let project = python38();
        assert_eq!(
            project.monitor_url(),
            "https://copr.fedorainfracloud.org/coprs/g/python/python3.8/monitor/"
        );
        assert_eq!(
            project.build_url(42),
            "https://copr.fedorainfracloud.org/coprs/g/python/python3.8/build/42/"
        );
        assert_eq!(
            project.log_url("foo", 42, BuildLog::Build),
            "https://copr-be.cloud.fedoraproject.org/results/@python/python3.8/fedora-rawhide-x86_64/00000042-foo/build.log.gz"
        );
    }

    #[test]
    fn test_user_project_urls() {
        let project = CoprProject::new("churchyard", "rpm-exclude-change", "fedora-rawhide-x86_64");
        assert_eq!(
            project.monitor_url(),
            "https://copr.fedorainfracloud.org/coprs/churchyard/rpm-exclude-change/monitor/"
        );
        assert!(project.result_dir_url("pyxattr", 1234567).ends_with(
            "/results/churchyard/rpm-exclude-change/fedora-rawhide-x86_64/01234567-pyxattr/"
        ));
    }

    #[test]
    fn test_decode_package_name() {
        assert_eq!(decode_package_name("libsigc%2B%2B20"), "libsigc++20");
        assert_eq!(decode_package_name("python-foo"), "python-foo");
    }

    #[test]
    fn test_produced_file_count() {
        let srpm_only = format!("<tr>{RPM_FILE_ROW}<td>foo.src.rpm</td></tr>");
        assert_eq!(produced_file_count(&srpm_only), 1);

        let built = format!(
            "<tr>{RPM_FILE_ROW}<td>foo.src.rpm</td></tr>\n<tr>{RPM_FILE_ROW}<td>foo.noarch.rpm</td></tr>"
        );
        assert_eq!(produced_file_count(&built), 2);
        assert_eq!(produced_file_count("<html></html>"), 0);
    }
}
