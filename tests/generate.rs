use std::path::{Path, PathBuf};

use feedstock_ci::{
    emit::CI_SUPPORT_DIR, forge_config::FORGE_CONFIG_FILE, generate, local_migrations,
    opt::GenerateOpts,
};
use feedstock_ci_migrations::LOCAL_MIGRATIONS_DIR;
use pretty_assertions::assert_eq;
use rattler_conda_types::Platform;

const IMAGE: &str = "quay.io/condaforge/linux-anvil-cos7-x86_64";

const OUTPUTS: &str = "\
default:
  - name: pkg
    used_vars: [python]
    top_level_vars: [python, numpy]
win-64: []
";

fn write(path: &Path, content: &str) {
    fs_err::create_dir_all(path.parent().unwrap()).unwrap();
    fs_err::write(path, content).unwrap();
}

fn feedstock(dir: &Path) {
    write(&dir.join(FORGE_CONFIG_FILE), "recipe_dir: recipe\n");
    write(
        &dir.join("recipe/conda_build_config.yaml"),
        &format!(
            "python: [\"3.9\", \"3.10\"]\nnumpy: [\"1.21\", \"1.23\"]\ndocker_image: [\"{IMAGE}\"]\nzip_keys:\n  - [python, numpy]\n"
        ),
    );
    write(&dir.join("outputs.yaml"), OUTPUTS);
}

fn opts(dir: &Path, platforms: &[Platform]) -> GenerateOpts {
    GenerateOpts {
        feedstock_dir: dir.to_path_buf(),
        forge_config: None,
        variant_config: Vec::new(),
        rendered_outputs: dir.join("outputs.yaml"),
        target_platforms: platforms.to_vec(),
        shared_migrations: None,
    }
}

fn file_names(paths: &[PathBuf]) -> Vec<String> {
    paths
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect()
}

#[test]
fn test_generate_with_local_migration() {
    let tmp = tempfile::tempdir().unwrap();
    feedstock(tmp.path());
    write(
        &tmp.path().join(LOCAL_MIGRATIONS_DIR).join("python312.yaml"),
        "__migrator:\n  migration_number: 1\nmigrator_ts: 1700000000\npython: [\"3.12\"]\nnumpy: [\"1.26\"]\n",
    );

    let written = generate(&opts(tmp.path(), &[Platform::Linux64, Platform::Osx64])).unwrap();
    assert_eq!(
        file_names(&written),
        vec![
            "linux_64_numpy1_21python3_9.yaml",
            "linux_64_numpy1_23python3_10.yaml",
            "linux_64_numpy1_26python3_12.yaml",
            "osx_64_numpy1_21python3_9.yaml",
            "osx_64_numpy1_23python3_10.yaml",
            "osx_64_numpy1_26python3_12.yaml",
        ]
    );

    let content =
        fs_err::read_to_string(tmp.path().join(CI_SUPPORT_DIR).join(&file_names(&written)[2]))
            .unwrap();
    assert_eq!(
        content,
        format!(
            "\
docker_image:
- {IMAGE}
numpy:
- '1.26'
python:
- '3.12'
zip_keys:
- - python
  - numpy
"
        )
    );
}

#[test]
fn test_generate_twice_is_identical() {
    let tmp = tempfile::tempdir().unwrap();
    feedstock(tmp.path());
    let stale = tmp.path().join(CI_SUPPORT_DIR).join("linux_64_python2_7.yaml");
    write(&stale, "python: ['2.7']\n");

    let options = opts(tmp.path(), &[Platform::Linux64]);
    let first = generate(&options).unwrap();
    assert!(!stale.exists());
    let contents = first
        .iter()
        .map(|path| fs_err::read_to_string(path).unwrap())
        .collect::<Vec<_>>();

    let second = generate(&options).unwrap();
    assert_eq!(first, second);
    let again = second
        .iter()
        .map(|path| fs_err::read_to_string(path).unwrap())
        .collect::<Vec<_>>();
    assert_eq!(contents, again);
}

#[test]
fn test_platform_without_outputs_is_disabled() {
    let tmp = tempfile::tempdir().unwrap();
    feedstock(tmp.path());

    let written = generate(&opts(tmp.path(), &[Platform::Win64])).unwrap();
    assert!(written.is_empty());
}

#[test]
fn test_render_failure_leaves_configs_alone() {
    let tmp = tempfile::tempdir().unwrap();
    feedstock(tmp.path());
    // zipped variables of different length cannot be expanded
    write(
        &tmp.path().join("recipe/conda_build_config.yaml"),
        "python: [\"3.9\", \"3.10\"]\nnumpy: [\"1.21\"]\nzip_keys:\n  - [python, numpy]\n",
    );
    let existing = tmp.path().join(CI_SUPPORT_DIR).join("linux_64_python3_9.yaml");
    write(&existing, "python: ['3.9']\n");

    let err = generate(&opts(tmp.path(), &[Platform::Linux64])).unwrap_err();
    assert!(err.to_string().contains("linux-64"), "{err}");
    assert!(existing.exists());
}

#[test]
fn test_missing_forge_config() {
    let tmp = tempfile::tempdir().unwrap();
    let err = generate(&opts(tmp.path(), &[Platform::Linux64])).unwrap_err();
    assert!(err.to_string().contains("Could not find config file"), "{err}");
}

#[test]
fn test_local_migrations_are_listed_oldest_first() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = tmp.path().join(LOCAL_MIGRATIONS_DIR);
    write(&dir.join("a.yaml"), "migrator_ts: 20\n");
    write(&dir.join("b.yaml"), "migrator_ts: 3\n");
    write(&dir.join("c.yaml"), "libfoo: [\"1\"]\n");

    let migrations = local_migrations(tmp.path()).unwrap();
    assert_eq!(
        file_names(&migrations.into_iter().map(|m| m.path).collect::<Vec<_>>()),
        vec!["b.yaml", "a.yaml", "c.yaml"]
    );
}
