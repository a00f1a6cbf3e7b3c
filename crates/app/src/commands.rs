use anyhow::{Context, Result};
use billview_core::{summarize_by_category, CategoryRule, Month, EXPENSE, INCOME};
use billview_import::{
    export_csv, recategorize, Categorizer, FileStatus, ImportReport, Importer, MatcherState,
};
use billview_storage::TransactionFilter;
use std::collections::BTreeSet;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::AppState;

pub async fn import(
    state: &AppState,
    files: &[PathBuf],
    dry_run: bool,
    out: &mut impl Write,
) -> Result<ImportReport> {
    let importer = Importer::new(state.matcher.clone());
    let report = importer.import_paths(files).await;

    for outcome in &report.outcomes {
        match &outcome.status {
            FileStatus::Imported { records } => {
                writeln!(out, "{}: {} records", outcome.file_name, records)?
            }
            FileStatus::Skipped { reason } => {
                writeln!(out, "{}: skipped ({reason})", outcome.file_name)?
            }
            FileStatus::Failed { error } => {
                writeln!(out, "{}: failed ({error})", outcome.file_name)?
            }
        }
    }

    if dry_run {
        writeln!(out, "Parsed {} records (dry run, nothing saved)", report.records.len())?;
    } else {
        let ids = billview_storage::insert_transactions(&state.db, &report.records)
            .await
            .context("saving imported records")?;
        writeln!(out, "Saved {} records", ids.len())?;
    }
    Ok(report)
}

pub async fn list(
    state: &AppState,
    filter: &TransactionFilter,
    out: &mut impl Write,
) -> Result<()> {
    let records = billview_storage::get_transactions(&state.db, filter).await?;
    for r in &records {
        writeln!(
            out,
            "{}\t{}\t{}\t{}\t{}\t{}",
            r.transaction_time, r.kind, r.amount, r.transaction_category, r.counterparty, r.product_name
        )?;
    }
    writeln!(out, "{} transactions", records.len())?;
    Ok(())
}

pub async fn report(state: &AppState, month: Option<Month>, out: &mut impl Write) -> Result<()> {
    let filter = TransactionFilter {
        month,
        ..Default::default()
    };
    let records = billview_storage::get_transactions(&state.db, &filter).await?;

    let months: BTreeSet<Month> = records
        .iter()
        .filter_map(|r| Month::of(&r.transaction_time))
        .collect();
    match (months.first(), months.last()) {
        (Some(first), Some(last)) if first == last => writeln!(out, "{first}")?,
        (Some(first), Some(last)) => writeln!(out, "{first} .. {last}")?,
        _ => writeln!(out, "No transactions")?,
    }

    for kind in [EXPENSE, INCOME] {
        let totals = summarize_by_category(&records, kind);
        if totals.is_empty() {
            continue;
        }
        writeln!(out, "{kind}:")?;
        for t in totals {
            writeln!(out, "  {}\t{}\t({} items)", t.category, t.total, t.count)?;
        }
    }
    Ok(())
}

pub fn list_rules(state: &AppState, out: &mut impl Write) -> Result<()> {
    for (keyword, category) in state.matcher.mappings() {
        writeln!(out, "{keyword}\t{category}")?;
    }
    writeln!(out, "{} keywords ({:?})", state.matcher.keyword_count(), state.matcher.state())?;
    Ok(())
}

pub async fn reload_rules(state: &AppState, out: &mut impl Write) -> Result<()> {
    match state.matcher.reload().await {
        MatcherState::Ready => {
            writeln!(out, "Loaded {} keywords", state.matcher.keyword_count())?;
            Ok(())
        }
        other => anyhow::bail!("category rules failed to load ({other:?})"),
    }
}

pub async fn set_rule(
    state: &AppState,
    category: String,
    keywords: Vec<String>,
    out: &mut impl Write,
) -> Result<()> {
    let rule = CategoryRule {
        id: None,
        category,
        keywords,
    };
    billview_storage::save_category_rule(&state.db, &rule).await?;
    writeln!(out, "Saved {} ({} keywords)", rule.category, rule.keywords.len())?;
    reload_rules(state, out).await
}

pub async fn delete_rule(state: &AppState, category: &str, out: &mut impl Write) -> Result<()> {
    if !billview_storage::delete_category_rule(&state.db, category).await? {
        anyhow::bail!("no category named {category}");
    }
    writeln!(out, "Deleted {category}")?;
    reload_rules(state, out).await
}

pub async fn recategorize_all(state: &AppState, out: &mut impl Write) -> Result<usize> {
    if !state.matcher.is_ready() {
        anyhow::bail!(
            "category rules are not loaded ({:?}); stored categories left unchanged",
            state.matcher.state()
        );
    }
    let records =
        billview_storage::get_transactions(&state.db, &TransactionFilter::default()).await?;
    let changes = recategorize(&records, state.matcher.as_ref());

    for (i, category) in &changes {
        let Some(id) = records[*i].id else { continue };
        billview_storage::update_transaction_category(&state.db, id, category).await?;
    }
    writeln!(out, "Updated {} of {} transactions", changes.len(), records.len())?;
    Ok(changes.len())
}

pub async fn export(
    state: &AppState,
    path: &Path,
    month: Option<Month>,
    out: &mut impl Write,
) -> Result<()> {
    let filter = TransactionFilter {
        month,
        ..Default::default()
    };
    let records = billview_storage::get_transactions(&state.db, &filter).await?;
    let file = std::fs::File::create(path).with_context(|| format!("create {}", path.display()))?;
    export_csv(&records, file).with_context(|| format!("write {}", path.display()))?;
    writeln!(out, "Exported {} transactions to {}", records.len(), path.display())?;
    Ok(())
}
