//! `nbtschema-driver <archive-dir> <entity-list.json> <entry-method> <entry-descriptor>
//! [output-path]`
//!
//! `archive-dir` is a directory of `.class` files laid out by internal name (`a/b/C.class`).
//! `entity-list.json` enumerates the entities to analyze (see
//! [`nbtschema_driver::EntityListDocument`]). `entry-method`/`entry-descriptor` name the save
//! method each entity's class is analyzed from, e.g. `writeNbt` and
//! `(Lnet/minecraft/nbt/NbtCompound;)Lnet/minecraft/nbt/NbtCompound;` — this is the "naming
//! convention" 4.9 describes as supplied on the command line, since it varies across target
//! framework versions. With no trailing output path the result is written to stdout.

use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context};

use nbtschema_classfile::DirectoryClassSource;
use nbtschema_driver::{run, EntityListDocument};

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let archive_dir = args.next().context("missing required argument: archive-dir")?;
    let entity_list_path = args.next().context("missing required argument: entity-list.json")?;
    let entry_method = args.next().context("missing required argument: entry-method")?;
    let entry_descriptor = args.next().context("missing required argument: entry-descriptor")?;
    let output_path = args.next();

    if args.next().is_some() {
        bail!("too many arguments; expected archive-dir entity-list.json entry-method entry-descriptor [output-path]");
    }

    let entity_list_bytes =
        fs::read(&entity_list_path).with_context(|| format!("reading entity list {entity_list_path}"))?;
    let entity_list: EntityListDocument = serde_json::from_slice(&entity_list_bytes)
        .with_context(|| format!("parsing entity list {entity_list_path}"))?;

    let archive_dir = PathBuf::from(archive_dir);
    let document = run(&entity_list, &entry_method, &entry_descriptor, || {
        Box::new(DirectoryClassSource::new(archive_dir.clone()))
    })
    .with_context(|| format!("analyzing entry point {entry_method}{entry_descriptor}"))?;

    let json = serde_json::to_string_pretty(&document).context("serializing output document")?;

    match output_path {
        Some(path) => fs::write(&path, json).with_context(|| format!("writing output to {path}"))?,
        None => println!("{json}"),
    }

    Ok(())
}
