//! Query subcommands over a loaded topic graph.

use crate::Commands;
use anyhow::{anyhow, bail, Context, Result};
use colored::Colorize;
use ontograph_graph::{ClimbMode, ClimbOptions, TopicGraph, TopicQuery};
use ontograph_storage::{LoadedOntology, StorageConfig};

pub(crate) fn run(
    command: Commands,
    loaded: &LoadedOntology,
    config: &StorageConfig,
    json: bool,
) -> Result<()> {
    let graph = &loaded.graph;
    match command {
        Commands::Stats => cmd_stats(loaded, json),
        Commands::Label { topic } => cmd_label(graph, &topic, json),
        Commands::Broaders { topic } => cmd_broaders(graph, &topic, json),
        Commands::Descendants { topics, json_input } => {
            cmd_descendants(graph, topics, json_input.as_deref(), json)
        }
        Commands::Climb {
            topics,
            mode,
            min_support,
        } => {
            let options = ClimbOptions {
                min_support: min_support.unwrap_or(config.query.min_support),
            };
            cmd_climb(graph, &topics, &mode, &options, json)
        }
        Commands::Stem { word } => cmd_stem(graph, &word, json),
        Commands::Similar { term, n } => {
            cmd_similar(graph, &term, n.unwrap_or(config.query.top_n), json)
        }
        Commands::Setup
        | Commands::Update { .. }
        | Commands::Version
        | Commands::Build { .. } => Err(anyhow!("not a query command")),
    }
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn cmd_stats(loaded: &LoadedOntology, json: bool) -> Result<()> {
    let stats = loaded.graph.stats();
    if json {
        return print_json(&serde_json::json!({
            "version": loaded.version,
            "source": loaded.source,
            "stats": stats,
        }));
    }

    println!("{} {}", "Ontology version".bold(), loaded.version);
    println!("  topics:          {}", stats.topics);
    println!("  interned labels: {}", stats.interned);
    println!("  broader edges:   {}", stats.broader_edges);
    println!("  same-as links:   {}", stats.same_as_links);
    println!("  primary labels:  {}", stats.primary_labels);
    println!("  stems:           {}", stats.stems);
    println!("  max level:       {}", stats.max_level);
    Ok(())
}

fn cmd_label(graph: &TopicGraph, topic: &str, json: bool) -> Result<()> {
    let primary = graph.resolve_label(topic);
    let cluster = graph.cluster_of(primary);
    if json {
        return print_json(&serde_json::json!({
            "topic": topic,
            "known": graph.contains(topic),
            "primary_label": primary,
            "cluster": cluster,
        }));
    }

    println!("{} -> {}", topic, primary.green().bold());
    if cluster.len() > 1 {
        println!("  cluster: {}", cluster.join(", "));
    }
    if !graph.contains(topic) && primary == topic {
        println!("  {}", "(not a known topic)".dimmed());
    }
    Ok(())
}

fn cmd_broaders(graph: &TopicGraph, topic: &str, json: bool) -> Result<()> {
    if !graph.contains(topic) {
        bail!("topic '{topic}' is not available in this version of the ontology");
    }
    let direct = graph.broaders_of(topic);
    let all = graph.all_broaders_of(topic);
    let level = graph.level_of(topic);
    if json {
        return print_json(&serde_json::json!({
            "topic": topic,
            "level": level,
            "broaders": direct,
            "all_broaders": all,
        }));
    }

    println!(
        "{} (level {})",
        topic.bold(),
        level.map_or_else(|| "?".to_string(), |l| l.to_string())
    );
    for broader in &all {
        let marker = if direct.contains(broader) { "*" } else { " " };
        println!("  {marker} {broader}");
    }
    Ok(())
}

fn cmd_descendants(
    graph: &TopicGraph,
    topics: Vec<String>,
    json_input: Option<&str>,
    json: bool,
) -> Result<()> {
    let query = match json_input {
        Some(raw) => {
            let value: serde_json::Value =
                serde_json::from_str(raw).context("--json-input is not valid JSON")?;
            TopicQuery::from_json(&value)?
        }
        None if topics.is_empty() => bail!("give at least one topic or --json-input"),
        None => TopicQuery::from(topics),
    };

    let descendants = graph.all_descendants_of(query)?;
    if json {
        return print_json(&descendants);
    }
    for topic in &descendants {
        println!("{topic}");
    }
    eprintln!("{} topics", descendants.len());
    Ok(())
}

fn cmd_climb(
    graph: &TopicGraph,
    topics: &[String],
    mode: &str,
    options: &ClimbOptions,
    json: bool,
) -> Result<()> {
    let mode: ClimbMode = mode.parse()?;
    let inferred = graph.climb_with(topics, mode, options);
    if json {
        return print_json(&inferred);
    }

    if inferred.is_empty() {
        println!("{}", "no broader topics inferred".dimmed());
        return Ok(());
    }
    let mut ranked: Vec<_> = inferred.iter().collect();
    ranked.sort_by(|a, b| b.1.matched.cmp(&a.1.matched).then(a.0.cmp(b.0)));
    for (topic, entry) in ranked {
        println!(
            "{:>4}  {}  {}",
            entry.matched,
            topic.bold(),
            format!("<- {}", entry.broader_of.join(", ")).dimmed()
        );
    }
    Ok(())
}

fn cmd_stem(graph: &TopicGraph, word: &str, json: bool) -> Result<()> {
    let matches = graph.closest_by_stem(word);
    if json {
        return print_json(&matches);
    }
    for topic in matches {
        println!("{topic}");
    }
    Ok(())
}

fn cmd_similar(graph: &TopicGraph, term: &str, n: usize, json: bool) -> Result<()> {
    let scored = graph.top_n_similar(term, n);
    if json {
        let rows: Vec<_> = scored
            .iter()
            .map(|(topic, score)| serde_json::json!({ "topic": topic, "score": score }))
            .collect();
        return print_json(&rows);
    }
    for (topic, score) in scored {
        println!("{score:.3}  {topic}");
    }
    Ok(())
}
