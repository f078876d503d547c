use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::sync::atomic::Ordering;
use std::thread;
use std::time::Duration;

use rovlink_session::{Delivery, PollOutcome};
use tracing::info;

use crate::cmd::send::connect_link;
use crate::cmd::signal::install_ctrlc_handler;
use crate::cmd::BridgeArgs;
use crate::exit::{session_error, CliResult, SUCCESS};
use crate::output::{print_record, print_stats, OutputFormat};

const IDLE_SLEEP: Duration = Duration::from_millis(5);

pub fn run(args: BridgeArgs, format: OutputFormat) -> CliResult<i32> {
    let running = install_ctrlc_handler()?;
    let mut session = connect_link(&args.link)?;

    let queue: Rc<RefCell<VecDeque<Delivery>>> = Rc::default();
    let sink = queue.clone();
    session.on_any(move |delivery| sink.borrow_mut().push_back(delivery.clone()));

    session
        .start()
        .map_err(|err| session_error("start failed", err))?;

    let mut printed = 0usize;
    'outer: while running.load(Ordering::SeqCst) {
        let outcome = session
            .poll()
            .map_err(|err| session_error("receive failed", err))?;

        loop {
            let Some(delivery) = queue.borrow_mut().pop_front() else {
                break;
            };
            if !wanted(args.categories.as_deref(), delivery.record.category()) {
                continue;
            }
            print_record(
                delivery.sequence,
                Some(delivery.host_time),
                &delivery.record,
                format,
            );
            printed = printed.saturating_add(1);
            if args.count.is_some_and(|count| printed >= count) {
                break 'outer;
            }
        }

        if outcome == PollOutcome::Idle {
            thread::sleep(IDLE_SLEEP);
        }
    }

    session
        .shutdown()
        .map_err(|err| session_error("shutdown failed", err))?;

    let stats = session.stats();
    info!(
        accepted = stats.frames_accepted,
        rejected = stats.frames_rejected,
        dropped = stats.frames_dropped,
        gaps = stats.sequence_gaps,
        "bridge finished"
    );
    if args.stats {
        print_stats(&stats, format);
    }
    Ok(SUCCESS)
}

fn wanted(filter: Option<&[String]>, category: &str) -> bool {
    filter.is_none_or(|categories| categories.iter().any(|c| c == category))
}
