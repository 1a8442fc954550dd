//! Failure paths of the real `libloading` backend
//!
//! Run against real files and real system libraries; the success path is in
//! `native_plugin.rs`.

#[cfg(test)]
mod native_failure_tests {
    use hearth::plugins::{LoaderConfig, PluginError, PluginFacade};
    use hearth::Host;
    use std::path::PathBuf;
    use tempfile::tempdir;

    /// A system library that certainly does not export the entry point
    fn system_library() -> Option<PathBuf> {
        [
            "/lib/x86_64-linux-gnu/libc.so.6",
            "/usr/lib/x86_64-linux-gnu/libc.so.6",
            "/lib/aarch64-linux-gnu/libc.so.6",
            "/usr/lib/aarch64-linux-gnu/libc.so.6",
            "/lib64/libc.so.6",
            "/usr/lib64/libc.so.6",
            "/usr/lib/libSystem.B.dylib",
        ]
        .iter()
        .map(PathBuf::from)
        .find(|path| path.is_file())
    }

    #[test]
    fn test_non_library_file_fails_to_open() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(libloading::library_filename("fake"));
        std::fs::write(&path, b"not a shared object").unwrap();

        let host = Host::new("native-test");
        let mut facade = PluginFacade::native(&host, LoaderConfig::default());

        let err = facade.load_plugin(path.to_str().unwrap()).unwrap_err();
        assert!(matches!(err, PluginError::OpenFailed { .. }), "got {err}");
        assert!(facade.is_empty());
    }

    #[test]
    fn test_library_without_entry_point_is_rejected() {
        let Some(library) = system_library() else {
            return;
        };

        let host = Host::new("native-test");
        let mut facade = PluginFacade::native(&host, LoaderConfig::default());

        let err = facade.load_plugin(library.to_str().unwrap()).unwrap_err();
        match err {
            PluginError::EntryPointMissing { symbol, .. } => {
                assert_eq!(symbol, "hearth_plugin_main");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(facade.is_empty());
        assert!(host.capabilities().is_empty());
    }

    #[test]
    fn test_manifest_with_unloadable_entries_still_reports_each() {
        let dir = tempdir().unwrap();
        let fake = dir.path().join(libloading::library_filename("fake"));
        std::fs::write(&fake, b"not a shared object").unwrap();
        let manifest = dir.path().join("plugins.xml");
        std::fs::write(
            &manifest,
            format!(
                "<config>\n  <plugin path=\"{}\"/>\n  <plugin path=\"missing\"/>\n</config>\n",
                fake.display()
            ),
        )
        .unwrap();

        let host = Host::new("native-test");
        let config = LoaderConfig {
            plugin_dir: Some(dir.path().to_path_buf()),
            ..LoaderConfig::default()
        };
        let mut facade = PluginFacade::native(&host, config);

        let report = facade.load_plugins_from_manifest(&manifest).unwrap();
        let failed: Vec<&str> = report.failed().map(|(entry, _)| entry.path.as_str()).collect();
        assert_eq!(failed, vec![fake.to_str().unwrap(), "missing"]);
        assert!(report
            .failed()
            .all(|(_, err)| matches!(err, PluginError::OpenFailed { .. })));
        assert_eq!(facade.configuration_file(), Some(manifest.as_path()));
        assert!(facade.is_empty());
    }

    #[test]
    fn test_bare_name_is_found_in_plugin_dir() {
        let dir = tempdir().unwrap();
        let file = dir.path().join(libloading::library_filename("renderer"));
        std::fs::write(&file, b"not a shared object").unwrap();

        let host = Host::new("native-test");
        let config = LoaderConfig {
            plugin_dir: Some(dir.path().to_path_buf()),
            ..LoaderConfig::default()
        };
        let mut facade = PluginFacade::native(&host, config);

        // Resolution finds the file; the OS then refuses it
        let err = facade.load_plugin("renderer").unwrap_err();
        match err {
            PluginError::OpenFailed { path, .. } => {
                assert_eq!(path, std::fs::canonicalize(&file).unwrap());
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
