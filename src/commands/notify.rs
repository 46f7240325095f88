use std::sync::Arc;

use colored::Colorize;
use issue_semsearch::embeddings::EmbeddingGenerator;
use issue_semsearch::error::Result;
use issue_semsearch::indexing::{HostEvent, IndexingPipeline, IssueHooks, WorkerPool};
use issue_semsearch::Config;

use crate::cli::NotifyCommand;

use super::{
    current_thread_runtime, load_catalog, open_store, pool_options, print_disabled_notice,
};

fn host_event(command: NotifyCommand) -> HostEvent {
    match command {
        NotifyCommand::Issue {
            issue_id,
            edited: false,
        } => HostEvent::IssueCreated { issue_id },
        NotifyCommand::Issue {
            issue_id,
            edited: true,
        } => HostEvent::IssueEdited { issue_id },
        NotifyCommand::Journal {
            journalized_id,
            journalized_type,
            edited: false,
        } => HostEvent::JournalCreated {
            journalized_type,
            journalized_id,
        },
        NotifyCommand::Journal {
            journalized_id,
            journalized_type,
            edited: true,
        } => HostEvent::JournalEdited {
            journalized_type,
            journalized_id,
        },
        NotifyCommand::TimeEntry { issue } => HostEvent::TimeEntrySaved { issue_id: issue },
    }
}

pub fn cmd_notify(config: &Config, command: NotifyCommand) -> Result<()> {
    let event = host_event(command);
    let hooks = IssueHooks::new(config.settings.enabled);

    if !config.settings.enabled {
        print_disabled_notice();
        return Ok(());
    }
    if event.affected_issue().is_none() {
        println!("{}", "Event does not touch an issue, nothing scheduled.".dimmed());
        return Ok(());
    }

    let catalog = load_catalog(config)?;
    let generator = EmbeddingGenerator::from_config(config)?;
    let pipeline = Arc::new(IndexingPipeline::new(generator, open_store(config)?, true));
    let options = pool_options(config, None);

    let rt = current_thread_runtime()?;
    let (scheduled, report) = rt.block_on(async {
        let pool = WorkerPool::start(pipeline, catalog, options, None);
        let scheduled = hooks.dispatch(&event, &pool);
        let report = pool.shutdown().await;
        scheduled.map(|scheduled| (scheduled, report))
    })?;

    let Some(changed) = scheduled else {
        return Ok(());
    };

    if report.failed > 0 {
        println!(
            "{}",
            format!(
                "Embedding update for issue #{} failed (see log output).",
                changed.issue_id
            )
            .red()
        );
    } else if report.indexed > 0 {
        println!(
            "{} embedding for issue #{}",
            "Updated".green().bold(),
            changed.issue_id
        );
    } else {
        println!(
            "{} issue #{} needs no update",
            "Checked".dimmed(),
            changed.issue_id
        );
    }

    Ok(())
}
