//! Cache behavior against real files

use std::fs::{self, File};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tempfile::TempDir;

use arbor::compiler::loader::FsMarkupLoader;
use arbor::compiler::MarkupCompiler;
use arbor::metadata::{ControlMetadata, RegistryBuilder};

fn compiler_over(dir: &TempDir) -> MarkupCompiler {
    let mut builder = RegistryBuilder::new();
    builder.register_control(
        None,
        "Panel",
        ControlMetadata::new("Panel").with_html_attributes(),
    );
    MarkupCompiler::new(
        Arc::new(builder.build()),
        Arc::new(FsMarkupLoader::new(dir.path())),
    )
}

fn write_markup(dir: &TempDir, name: &str, content: &str, modified: SystemTime) {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    let file = File::options().write(true).open(&path).unwrap();
    file.set_modified(modified).unwrap();
}

#[test]
fn test_same_file_compiled_once() {
    let dir = TempDir::new().unwrap();
    write_markup(&dir, "index.vhtml", "<Panel />", SystemTime::now());

    let compiler = compiler_over(&dir);
    let first = compiler.compile_file("index.vhtml").unwrap();
    let second = compiler.compile_file("index.vhtml").unwrap();
    assert!(Arc::ptr_eq(&first, &second));
}

#[test]
fn test_touched_file_recompiles() {
    let dir = TempDir::new().unwrap();
    let t0 = SystemTime::now();
    write_markup(&dir, "index.vhtml", "<Panel />", t0);

    let compiler = compiler_over(&dir);
    let first = compiler.compile_file("index.vhtml").unwrap();

    write_markup(
        &dir,
        "index.vhtml",
        r#"<Panel class="v2" />"#,
        t0 + Duration::from_secs(10),
    );
    let second = compiler.compile_file("index.vhtml").unwrap();
    assert!(!Arc::ptr_eq(&first, &second));
    assert_eq!(
        second.instantiate().unwrap().children[0]
            .html_attributes
            .len(),
        1
    );

    // and the new artifact is cached in turn
    let third = compiler.compile_file("index.vhtml").unwrap();
    assert!(Arc::ptr_eq(&second, &third));
}

#[test]
fn test_concurrent_requests_share_one_compile() {
    let dir = TempDir::new().unwrap();
    write_markup(&dir, "index.vhtml", "<Panel>shared</Panel>", SystemTime::now());

    let compiler = Arc::new(compiler_over(&dir));
    let pages: Vec<_> = std::thread::scope(|scope| {
        (0..8)
            .map(|_| {
                let compiler = compiler.clone();
                scope.spawn(move || compiler.compile_file("index.vhtml").unwrap())
            })
            .collect::<Vec<_>>()
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .collect()
    });

    for page in &pages[1..] {
        assert!(Arc::ptr_eq(&pages[0], page));
    }
}

#[test]
fn test_master_page_chain_from_disk() {
    let dir = TempDir::new().unwrap();
    let now = SystemTime::now();
    write_markup(&dir, "site.vhtml", "<Panel>chrome</Panel>", now);
    write_markup(
        &dir,
        "page.vhtml",
        "@masterPage site.vhtml\n<Panel>content</Panel>",
        now,
    );

    let compiler = compiler_over(&dir);
    let page = compiler.compile_file("page.vhtml").unwrap();
    assert_eq!(
        page.master.as_ref().unwrap().identity.virtual_path,
        "site.vhtml"
    );
}
