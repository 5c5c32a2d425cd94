use crate::config::find_proofs_path;
use crate::evidence::{Evidence, ExportFormat};
use crate::query::{EvidenceFilter, TimeRange};
use crate::types::{
    AuditPreview, DecoratedEntry, EvidencePatch, Impact, Insights, NewEvidence, Source, Status,
};
use serde::Serialize;
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::str::FromStr;

/// Open the evidence log for the current project
fn open() -> Result<Evidence, String> {
    let proofs_path =
        find_proofs_path().ok_or("No .proofs directory found. Run 'proofs init' first.")?;
    let mut ev = Evidence::open_at(proofs_path).map_err(|e| e.to_string())?;
    ev.subscribe(|audit| {
        tracing::info!(
            total = audit.total_entries,
            needs_attention = audit.needs_attention_count,
            average_weight = audit.average_weight,
            "collection health refreshed"
        );
    });
    Ok(ev)
}

/// Split a comma-separated tag list
fn split_tags(tags: &str) -> Vec<String> {
    if tags.trim().is_empty() {
        Vec::new()
    } else {
        tags.split(',').map(|s| s.trim().to_string()).collect()
    }
}

/// Parse a filter choice where `all` means no restriction
fn parse_choice<T: FromStr<Err = String>>(value: &str) -> Result<Option<T>, String> {
    if value.trim().eq_ignore_ascii_case("all") {
        Ok(None)
    } else {
        value.parse().map(Some)
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), String> {
    let json =
        serde_json::to_string_pretty(value).map_err(|e| format!("Failed to serialize: {}", e))?;
    println!("{}", json);
    Ok(())
}

/// Run the init command
pub fn run_init(path: &str) -> Result<(), String> {
    let path = Path::new(path);
    let proofs_path = path.join(crate::config::PROOFS_DIR);

    if proofs_path.exists() {
        return Err(format!(".proofs already exists at {}", proofs_path.display()));
    }

    let ev = Evidence::init(path).map_err(|e| e.to_string())?;
    if let Some(p) = ev.proofs_path() {
        println!("Initialized .proofs at {}", p.display());
    }

    Ok(())
}

/// Run the add command
pub fn run_add(
    title: String,
    notes: Option<String>,
    tags: &str,
    impact: Option<Impact>,
    source: Option<Source>,
    json: bool,
) -> Result<(), String> {
    let mut ev = open()?;

    let created = ev
        .create(NewEvidence {
            title,
            notes,
            tags: split_tags(tags),
            impact,
            source,
        })
        .map_err(|e| e.to_string())?;

    if json {
        return print_json(&created);
    }

    println!("Logged [{}]", created.entry.id);
    if !created.entry.tags.is_empty() {
        println!("  tags: {}", created.entry.tags.join(", "));
    }
    print_health(&ev);

    Ok(())
}

/// Run the show command
pub fn run_show(id: &str, json: bool) -> Result<(), String> {
    let ev = open()?;
    let entry = ev
        .get_by_id(id)
        .map_err(|e| e.to_string())?
        .ok_or_else(|| format!("Evidence not found: {}", id))?;

    if json {
        return print_json(&entry);
    }

    print_entry(&entry);
    println!("    created:  {}", entry.entry.created_at.to_rfc3339());
    println!("    anchored: {}", entry.entry.last_anchored_at.to_rfc3339());
    if let Some(updated) = entry.entry.updated_at {
        println!("    updated:  {}", updated.to_rfc3339());
    }
    println!("    source:   {}", entry.entry.source);
    if let Some(notes) = &entry.entry.notes {
        println!("\n{}", notes);
    }

    Ok(())
}

/// Run the list command
pub fn run_list(status: &str, json: bool) -> Result<(), String> {
    let ev = open()?;
    let status: Option<Status> = parse_choice(status)?;
    let entries = ev.get_all(status).map_err(|e| e.to_string())?;

    if json {
        return print_json(&entries);
    }

    if entries.is_empty() {
        if status.is_some() {
            println!("No evidence in that tier.");
        } else {
            println!("No evidence yet. Add some with: proofs add \"...\"");
        }
        return Ok(());
    }

    for e in &entries {
        print_entry(e);
    }

    Ok(())
}

/// Run the search command
pub fn run_search(
    text: Option<String>,
    impact: &str,
    range: &str,
    tags: &str,
    status: &str,
    json: bool,
) -> Result<(), String> {
    let ev = open()?;

    let filter = EvidenceFilter {
        search_text: text,
        impact: parse_choice(impact)?,
        time_range: range.parse::<TimeRange>()?,
        tags: split_tags(tags),
        status: parse_choice(status)?,
    };

    let entries = ev.query(&filter).map_err(|e| e.to_string())?;

    if json {
        return print_json(&entries);
    }

    if entries.is_empty() {
        println!("No matching evidence.");
        return Ok(());
    }

    for e in &entries {
        print_entry(e);
    }

    Ok(())
}

/// Run the edit command
pub fn run_edit(
    id: &str,
    title: Option<String>,
    notes: Option<String>,
    tags: Option<&str>,
    impact: Option<Impact>,
    source: Option<Source>,
    json: bool,
) -> Result<(), String> {
    let patch = EvidencePatch {
        title,
        notes,
        tags: tags.map(split_tags),
        impact,
        source,
    };

    if patch.is_empty() {
        return Err("Nothing to change. Pass at least one of --title, --notes, --tags, --impact, --source".to_string());
    }

    let mut ev = open()?;
    let updated = ev.update(id, patch).map_err(|e| e.to_string())?;

    if json {
        return print_json(&updated);
    }

    println!("Updated [{}]", id);
    println!("  weight unchanged at {:.2} ({})", updated.weight, updated.status);
    print_health(&ev);

    Ok(())
}

/// Run the anchor command
pub fn run_anchor(id: &str, json: bool) -> Result<(), String> {
    let mut ev = open()?;
    let anchored = ev.anchor(id).map_err(|e| e.to_string())?;

    if json {
        return print_json(&anchored);
    }

    println!("Anchored [{}]", id);
    println!("  weight: {:.2} ({})", anchored.weight, anchored.status);
    print_health(&ev);

    Ok(())
}

/// Run the delete command
pub fn run_delete(id: &str, force: bool) -> Result<(), String> {
    let mut ev = open()?;

    let entry = ev
        .get_by_id(id)
        .map_err(|e| e.to_string())?
        .ok_or_else(|| format!("Evidence not found: {}", id))?;

    if !force {
        println!("Delete [{}]:", id);
        println!("  {}", entry.entry.title);

        print!("Confirm? [y/N] ");
        io::stdout().flush().map_err(|e| e.to_string())?;

        let mut input = String::new();
        io::stdin()
            .read_line(&mut input)
            .map_err(|e| e.to_string())?;

        if !input.trim().eq_ignore_ascii_case("y") {
            println!("Cancelled.");
            return Ok(());
        }
    }

    ev.delete(id).map_err(|e| e.to_string())?;
    println!("Deleted [{}]", id);
    print_health(&ev);

    Ok(())
}

/// Run the audit command
pub fn run_audit(json: bool) -> Result<(), String> {
    let ev = open()?;
    let audit = ev.audit_preview().map_err(|e| e.to_string())?;

    if json {
        return print_json(&audit);
    }

    print_audit(&audit);
    Ok(())
}

fn print_audit(audit: &AuditPreview) {
    println!("Evidence Health");
    println!("===============\n");

    println!("Total entries:  {}", audit.total_entries);
    println!("Avg weight:     {:.2}", audit.average_weight);
    println!("Weighted total: {:.2}", audit.weighted_total);

    println!("\nBy tier:");
    for status in Status::ALL {
        println!("  {:8} {}", status, audit.status_distribution.get(status));
    }

    if audit.needs_attention_count > 0 {
        println!(
            "\n{} entr{} could use a fresh anchor. See: proofs list --status OLD",
            audit.needs_attention_count,
            if audit.needs_attention_count == 1 { "y" } else { "ies" }
        );
    }
}

/// Run the insights command
pub fn run_insights(json: bool) -> Result<(), String> {
    let ev = open()?;
    let insights = ev.insights().map_err(|e| e.to_string())?;

    if json {
        return print_json(&insights);
    }

    print_insights(&insights);
    Ok(())
}

fn print_insights(insights: &Insights) {
    println!("Last 30 Days");
    println!("============\n");

    println!("Logged: {}", insights.total_last30_days);

    if !insights.top_tags.is_empty() {
        println!("\nTop tags:");
        for tc in &insights.top_tags {
            println!("  {:20} {}", tc.tag, tc.count);
        }
    }

    println!("\nBy impact:");
    for impact in Impact::ALL {
        println!("  {:8} {}", impact, insights.impact_distribution.get(impact));
    }
}

/// Run the tags command
pub fn run_tags(json: bool) -> Result<(), String> {
    let ev = open()?;
    let tags = ev.tags().map_err(|e| e.to_string())?;

    if json {
        return print_json(&tags);
    }

    if tags.is_empty() {
        println!("No tags yet.");
        return Ok(());
    }

    println!("Tags:\n");
    for tc in tags {
        println!("  {:20} ({})", tc.tag, tc.count);
    }

    Ok(())
}

/// Run the export command
pub fn run_export(format: &str) -> Result<(), String> {
    let ev = open()?;
    let format: ExportFormat = format.parse()?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    ev.export(format, &mut out).map_err(|e| e.to_string())
}

/// Run the import command
pub fn run_import(file: &str) -> Result<(), String> {
    let mut ev = open()?;
    let mut input =
        fs::File::open(file).map_err(|e| format!("Failed to open {}: {}", file, e))?;

    let count = ev.import_json(&mut input).map_err(|e| e.to_string())?;
    println!("Imported {} entr{}", count, if count == 1 { "y" } else { "ies" });

    Ok(())
}

// One-line collection health after a mutation
fn print_health(ev: &Evidence) {
    if let Some(audit) = ev.last_audit() {
        println!(
            "  collection: {} entries, {} need re-anchoring",
            audit.total_entries, audit.needs_attention_count
        );
    }
}

// Helper to print an entry
fn print_entry(e: &DecoratedEntry) {
    let marker = if e.needs_reanchor { " !" } else { "" };
    println!(
        "[{}] {} {:.2}{} · {} · {}d",
        e.entry.id, e.status, e.weight, marker, e.entry.impact, e.age_days
    );

    if !e.entry.tags.is_empty() {
        println!("    tags: {}", e.entry.tags.join(", "));
    }

    println!("    {}\n", e.entry.title);
}
