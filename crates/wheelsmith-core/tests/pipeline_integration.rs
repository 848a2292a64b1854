//! Integration tests for the pipeline with a scripted command runner.
//!
//! Every external tool is replaced by `ScriptedRunner`; the filesystem is
//! real (tempdirs), so artifact lookup, DLL copying, and cleanup behave
//! exactly as in production.

use std::sync::Arc;

use wheelsmith_core::config::PipelineConfig;
use wheelsmith_core::fakes::ScriptedRunner;
use wheelsmith_core::pipeline::{Pipeline, PipelineOutcome};
use wheelsmith_core::platform::Os;

/// Test: a prerequisite failure launches no external process at all.
#[tokio::test]
async fn test_prerequisite_failure_launches_nothing() {
    let work = tempfile::tempdir().expect("tempdir failed");
    let mut config = PipelineConfig::new("slycot");
    config.os = Os::Linux; // platform gate fails immediately
    config.work_root = work.path().to_path_buf();

    let runner = Arc::new(ScriptedRunner::new());
    let report = Pipeline::with_runner(config, runner.clone()).run().await;

    assert_eq!(report.outcome, PipelineOutcome::PrerequisiteFailure);
    assert!(runner.invocations().is_empty());
    assert_eq!(report.failed_count(), 1);

    // Nothing was created, and cleanup left nothing behind either.
    assert!(!work.path().join("wheels").exists());
    assert!(!work.path().join("wheelhouse").exists());
}

#[cfg(unix)]
mod scenarios {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;
    use wheelsmith_core::config::RepairStrategy;
    use wheelsmith_core::verify::{VerifyFailure, VerifyOutcome};

    fn write_exe(dir: &Path, name: &str) {
        let path = dir.join(name);
        std::fs::write(&path, "#!/bin/sh\nexit 0\n").expect("write failed");
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
            .expect("chmod failed");
    }

    /// A root with fake tools on the search path, a populated vcpkg layout,
    /// and a work directory for the transient outputs.
    fn setup(repair_strategy: RepairStrategy) -> (TempDir, PipelineConfig) {
        let root = tempfile::tempdir().expect("tempdir failed");

        let bin = root.path().join("bin");
        std::fs::create_dir_all(&bin).expect("mkdir failed");
        for tool in ["uv", "gfortran", "gcc", "g++"] {
            write_exe(&bin, tool);
        }

        let vcpkg_root = root.path().join("vcpkg");
        let vcpkg_bin = vcpkg_root.join("installed").join("x64-windows").join("bin");
        std::fs::create_dir_all(&vcpkg_bin).expect("mkdir failed");
        std::fs::write(vcpkg_bin.join("openblas.dll"), b"blas").expect("write failed");

        let buildsystems = vcpkg_root.join("scripts").join("buildsystems");
        std::fs::create_dir_all(&buildsystems).expect("mkdir failed");
        std::fs::write(buildsystems.join("vcpkg.cmake"), b"").expect("write failed");

        let work = root.path().join("work");
        std::fs::create_dir_all(&work).expect("mkdir failed");

        let mut config = PipelineConfig::new("slycot");
        config.os = Os::Windows;
        config.search_path = Some(bin.as_os_str().to_os_string());
        config.vcpkg_root = vcpkg_root;
        config.work_root = work;
        config.repair_strategy = repair_strategy;
        (root, config)
    }

    fn place_wheel(dir: &Path) -> PathBuf {
        std::fs::create_dir_all(dir).expect("mkdir failed");
        let wheel = dir.join("slycot-1.0-cp311-win_amd64.whl");
        std::fs::write(&wheel, b"wheel").expect("write failed");
        wheel
    }

    /// Scenario: everything works — build, repair, offline install, clean
    /// self-test. The repair path must never touch the DLL copier.
    #[tokio::test]
    async fn test_full_success_with_delvewheel() {
        let (_root, config) = setup(RepairStrategy::Delvewheel);
        place_wheel(&config.wheel_dir());
        place_wheel(&config.repaired_dir());

        let runner = Arc::new(
            ScriptedRunner::new()
                .ok("") // bootstrap
                .ok("") // build
                .ok("") // repair
                .ok("") // install
                .ok("142 passed in 30.1s"), // self-test
        );
        let report = Pipeline::with_runner(config.clone(), runner.clone())
            .run()
            .await;

        assert_eq!(report.outcome, PipelineOutcome::Success);
        assert_eq!(report.verify, Some(VerifyOutcome::Passed));
        assert_eq!(runner.invocations().len(), 5);
        assert!(report.toolchain_fingerprint.is_some());
        assert!(report.missing_libraries.is_empty());

        // Mutual exclusion: the repair run never queried site-packages.
        assert!(runner.invoked_matching("delvewheel"));
        assert!(!runner.invoked_matching("sysconfig"));

        // Cleanup removed both transient directories.
        assert!(!config.wheel_dir().exists());
        assert!(!config.repaired_dir().exists());
    }

    /// Scenario: the build tool exits zero but writes no wheel. That is a
    /// build failure, and cleanup still removes the (empty) build dir.
    #[tokio::test]
    async fn test_clean_build_exit_without_wheel_is_build_failure() {
        let (_root, config) = setup(RepairStrategy::Delvewheel);

        let runner = Arc::new(ScriptedRunner::new().ok("").ok(""));
        let report = Pipeline::with_runner(config.clone(), runner.clone())
            .run()
            .await;

        assert_eq!(report.outcome, PipelineOutcome::BuildFailure);
        // Only bootstrap + build launched; no repair, install, or verify.
        assert_eq!(runner.invocations().len(), 2);
        assert!(!config.wheel_dir().exists());
    }

    /// Scenario: manual-copy strategy with one library missing from every
    /// candidate directory. The miss is reported; the pipeline still
    /// installs and verifies.
    #[tokio::test]
    async fn test_manual_copy_reports_missing_library() {
        let (root, config) = setup(RepairStrategy::CopyRuntimeLibs);
        place_wheel(&config.wheel_dir());

        // Compiler runtime DLLs live next to the compilers; liblapack.dll
        // is deliberately nowhere.
        let mingw_bin = root.path().join("bin");
        for dll in [
            "libgfortran-5.dll",
            "libgcc_s_seh-1.dll",
            "libquadmath-0.dll",
            "libwinpthread-1.dll",
        ] {
            std::fs::write(mingw_bin.join(dll), b"dll").expect("write failed");
        }

        let purelib = root.path().join("site-packages");
        std::fs::create_dir_all(purelib.join("slycot")).expect("mkdir failed");

        let runner = Arc::new(
            ScriptedRunner::new()
                .ok("") // bootstrap
                .ok("") // build
                .ok("") // install
                .ok(&purelib.display().to_string()) // sysconfig query
                .ok("141 passed"), // self-test
        );
        let report = Pipeline::with_runner(config.clone(), runner.clone())
            .run()
            .await;

        assert_eq!(report.outcome, PipelineOutcome::Success);
        assert_eq!(report.missing_libraries, vec!["liblapack.dll"]);
        assert_eq!(report.verify, Some(VerifyOutcome::Passed));

        // The resolved DLLs landed in the installed package directory.
        let package_dir = purelib.join("slycot");
        assert!(package_dir.join("libgfortran-5.dll").is_file());
        assert!(package_dir.join("openblas.dll").is_file());

        // Mutual exclusion: the manual-copy run never invoked the repair tool.
        assert!(!runner.invoked_matching("delvewheel"));
    }

    /// Scenario: the self-test dies with a module-resolution error. That is
    /// classified apart from an ordinary test failure — it points at the
    /// dependency stages, not at the package.
    #[tokio::test]
    async fn test_import_failure_classified_distinctly() {
        let (_root, config) = setup(RepairStrategy::Delvewheel);
        place_wheel(&config.wheel_dir());
        place_wheel(&config.repaired_dir());

        let stderr = "Traceback (most recent call last):\n\
                      ModuleNotFoundError: No module named 'slycot'";
        let runner = Arc::new(
            ScriptedRunner::new()
                .ok("")
                .ok("")
                .ok("")
                .ok("")
                .exit(1, "", stderr),
        );
        let report = Pipeline::with_runner(config.clone(), runner).run().await;

        assert_eq!(report.outcome, PipelineOutcome::VerificationFailure);
        match report.verify {
            Some(VerifyOutcome::Failed {
                failure: VerifyFailure::ImportResolution { ref detail },
            }) => assert!(detail.contains("ModuleNotFoundError")),
            ref other => panic!("expected ImportResolution, got {other:?}"),
        }

        // Failure or not, the transient directories are gone.
        assert!(!config.wheel_dir().exists());
        assert!(!config.repaired_dir().exists());
    }

    /// A generic test failure stays a generic test failure.
    #[tokio::test]
    async fn test_assertion_failure_is_not_an_import_failure() {
        let (_root, config) = setup(RepairStrategy::Delvewheel);
        place_wheel(&config.wheel_dir());
        place_wheel(&config.repaired_dir());

        let runner = Arc::new(
            ScriptedRunner::new()
                .ok("")
                .ok("")
                .ok("")
                .ok("")
                .exit(1, "1 failed, 141 passed", "E  assert ab01md result mismatch"),
        );
        let report = Pipeline::with_runner(config, runner).run().await;

        assert_eq!(report.outcome, PipelineOutcome::VerificationFailure);
        assert!(matches!(
            report.verify,
            Some(VerifyOutcome::Failed {
                failure: VerifyFailure::TestsFailed { exit_code: 1 }
            })
        ));
    }

    /// Repair failure is terminal: no silent fallback to the unrepaired
    /// wheel, no install, no verify.
    #[tokio::test]
    async fn test_repair_failure_is_terminal() {
        let (_root, config) = setup(RepairStrategy::Delvewheel);
        place_wheel(&config.wheel_dir());

        let runner = Arc::new(
            ScriptedRunner::new()
                .ok("")
                .ok("")
                .exit(1, "", "delvewheel: cannot find library"),
        );
        let report = Pipeline::with_runner(config.clone(), runner.clone())
            .run()
            .await;

        assert_eq!(report.outcome, PipelineOutcome::RepairFailure);
        assert_eq!(runner.invocations().len(), 3);
        assert!(!config.wheel_dir().exists());
        assert!(!config.repaired_dir().exists());
    }

    /// Install failure after a successful repair still cleans up.
    #[tokio::test]
    async fn test_install_failure_still_cleans_up() {
        let (_root, config) = setup(RepairStrategy::Delvewheel);
        place_wheel(&config.wheel_dir());
        place_wheel(&config.repaired_dir());

        let runner = Arc::new(
            ScriptedRunner::new()
                .ok("")
                .ok("")
                .ok("")
                .exit(1, "", "no compatible wheel found"),
        );
        let report = Pipeline::with_runner(config.clone(), runner.clone())
            .run()
            .await;

        assert_eq!(report.outcome, PipelineOutcome::InstallFailure);
        assert_eq!(runner.invocations().len(), 4);
        assert!(!config.wheel_dir().exists());
        assert!(!config.repaired_dir().exists());
    }

    /// With strict verification off, a failing self-test is reported but
    /// the run (and the install) stands.
    #[tokio::test]
    async fn test_test_failures_reported_only_when_not_strict() {
        let (_root, mut config) = setup(RepairStrategy::Delvewheel);
        config.strict_verify = false;
        place_wheel(&config.wheel_dir());
        place_wheel(&config.repaired_dir());

        let runner = Arc::new(
            ScriptedRunner::new()
                .ok("")
                .ok("")
                .ok("")
                .ok("")
                .exit(1, "3 failed", ""),
        );
        let report = Pipeline::with_runner(config, runner).run().await;

        assert_eq!(report.outcome, PipelineOutcome::Success);
        assert!(matches!(
            report.verify,
            Some(VerifyOutcome::Failed {
                failure: VerifyFailure::TestsFailed { .. }
            })
        ));
    }

    /// A self-test that passes with recognized warning markers is still an
    /// overall pass.
    #[tokio::test]
    async fn test_warned_self_test_is_still_success() {
        let (_root, config) = setup(RepairStrategy::Delvewheel);
        place_wheel(&config.wheel_dir());
        place_wheel(&config.repaired_dir());

        let runner = Arc::new(
            ScriptedRunner::new()
                .ok("")
                .ok("")
                .ok("")
                .ok("")
                .ok("140 passed\n== warnings summary ==\nDeprecationWarning: ..."),
        );
        let report = Pipeline::with_runner(config, runner).run().await;

        assert_eq!(report.outcome, PipelineOutcome::Success);
        assert!(matches!(
            report.verify,
            Some(VerifyOutcome::Warned { .. })
        ));
    }
}
