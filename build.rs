use std::collections::HashSet;
use std::env;
use std::error::Error;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use fst::MapBuilder;

#[path = "src/data.rs"]
mod data_model;
use data_model::{Range, parse_synonyms, parse_topics};

fn main() -> Result<(), Box<dyn Error>> {
    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR")?);
    let out_dir = PathBuf::from(env::var("OUT_DIR")?);

    let topics = load_topics(&manifest_dir)?;
    build_topic_index(&topics, &out_dir)?;
    build_synonym_index(&manifest_dir, &out_dir)?;

    Ok(())
}

fn read_data_file(manifest_dir: &Path, name: &str) -> Result<String, Box<dyn Error>> {
    let path = manifest_dir.join("data").join(name);
    println!("cargo:rerun-if-changed={}", path.display());
    if !path.exists() {
        panic!("Missing {}. The builtin catalog is compiled from it.", path.display());
    }
    Ok(fs::read_to_string(&path)?)
}

fn load_topics(manifest_dir: &Path) -> Result<Vec<String>, Box<dyn Error>> {
    let text = read_data_file(manifest_dir, "topics.txt")?;
    let mut seen = HashSet::new();
    let mut topics = Vec::new();
    for topic in parse_topics(&text)? {
        if !seen.insert(topic.clone()) {
            panic!("Duplicate topic {topic:?} in data/topics.txt");
        }
        topics.push(topic);
    }
    Ok(topics)
}

fn build_topic_index(topics: &[String], out_dir: &Path) -> Result<(), Box<dyn Error>> {
    let mut sorted: Vec<(&str, u64)> = topics
        .iter()
        .enumerate()
        .map(|(idx, topic)| (topic.as_str(), idx as u64))
        .collect();
    sorted.sort_by(|a, b| a.0.cmp(b.0));

    let fst_path = out_dir.join("topics.fst");
    let writer = BufWriter::new(File::create(&fst_path)?);
    let mut builder = MapBuilder::new(writer)?;
    for (topic, position) in &sorted {
        builder.insert(topic, *position)?;
    }
    builder.finish()?;
    println!("cargo:rustc-env=WIKILENS_TOPIC_FST={}", fst_path.display());

    let list_path = out_dir.join("topics.lst");
    fs::write(&list_path, topics.join("\n"))?;
    println!("cargo:rustc-env=WIKILENS_TOPIC_LIST={}", list_path.display());
    Ok(())
}

fn build_synonym_index(manifest_dir: &Path, out_dir: &Path) -> Result<(), Box<dyn Error>> {
    let text = read_data_file(manifest_dir, "synonyms.tsv")?;
    let mut rows = parse_synonyms(&text)?;
    rows.sort_by(|a, b| a.0.cmp(&b.0));
    for pair in rows.windows(2) {
        if pair[0].0 == pair[1].0 {
            panic!("Duplicate synonym {:?} in data/synonyms.tsv", pair[0].0);
        }
    }

    let fst_path = out_dir.join("synonyms.fst");
    let writer = BufWriter::new(File::create(&fst_path)?);
    let mut builder = MapBuilder::new(writer)?;
    let mut targets: Vec<String> = Vec::new();
    for (word, ids) in &rows {
        let range = Range::new(targets.len() as u32, ids.len() as u32);
        builder.insert(word, range.pack())?;
        targets.extend(ids.iter().cloned());
    }
    builder.finish()?;
    println!("cargo:rustc-env=WIKILENS_SYNONYM_FST={}", fst_path.display());

    let targets_path = out_dir.join("synonym_targets.lst");
    fs::write(&targets_path, targets.join("\n"))?;
    println!(
        "cargo:rustc-env=WIKILENS_SYNONYM_TARGETS={}",
        targets_path.display()
    );
    Ok(())
}
