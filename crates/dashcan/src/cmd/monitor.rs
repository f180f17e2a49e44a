use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use dashcan_frame::ChannelConfig;
use dashcan_session::{
    Endpoint, Session, SessionConfig, SessionError, SessionHandle, SessionObserver, Step,
};
use dashcan_signal::DecoderConfig;
use tracing::{info, warn};

use crate::cmd::{parse_duration, LogSink, MonitorArgs};
use crate::exit::{
    session_error, transport_error, CliError, CliResult, INTERNAL, SUCCESS, TRANSPORT_ERROR,
};
use crate::output::{print_event, OutputFormat};

#[derive(Default)]
struct MonitorObserver {
    timed_out: AtomicBool,
}

impl SessionObserver for MonitorObserver {
    fn on_connected(&self, label: &str) {
        info!(%label, "device connected");
    }

    fn on_disconnected(&self) {
        info!("device disconnected");
    }

    fn on_timeout(&self) {
        warn!("device went quiet");
        self.timed_out.store(true, Ordering::SeqCst);
    }

    fn on_error(&self, msg: &str) {
        warn!("{msg}");
    }
}

pub fn run(args: MonitorArgs, format: OutputFormat) -> CliResult<i32> {
    let endpoint: Endpoint = args
        .endpoint
        .parse()
        .map_err(|err| transport_error("invalid endpoint", err))?;
    let guard_timeout = parse_duration(&args.guard_timeout)?;
    let attach_timeout = parse_duration(&args.attach_timeout)?;
    let poll_interval = parse_duration(&args.poll_interval)?;
    let run_for = args.duration.as_deref().map(parse_duration).transpose()?;

    let config = SessionConfig::default()
        .with_attach_timeout(attach_timeout)
        .with_guard_timeout(guard_timeout)
        .with_channel_config(ChannelConfig::default().with_poll_interval(poll_interval))
        .with_decoder_config(
            DecoderConfig::default().with_steering_trigger(args.steering_trigger.into()),
        );

    let ids = config.signal_decoder().ids();
    let observer = Arc::new(MonitorObserver::default());
    let session_observer: Arc<dyn SessionObserver> = observer.clone();
    let mut session = Session::connect(&endpoint, &ids, config, session_observer)
        .map_err(|err| session_error("attach failed", err))?;
    let mut dispatcher = session.dispatcher(LogSink);

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone(), session.handle())?;

    let deadline = run_for.map(|d| Instant::now() + d);
    let mut printed = 0usize;

    loop {
        if observer.timed_out.load(Ordering::SeqCst) {
            session.stop();
            return Err(session_error(
                "monitor",
                SessionError::LivenessTimeout(guard_timeout),
            ));
        }
        if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            break;
        }

        let step = session
            .step(&mut dispatcher)
            .map_err(|err| session_error("monitor", err))?;
        match step {
            Step::Dispatched(Ok(Some(event))) => {
                print_event(&event, session.label(), format);
                printed = printed.saturating_add(1);
                if args.count.is_some_and(|count| printed >= count) {
                    break;
                }
            }
            Step::Stopped if running.load(Ordering::SeqCst) => {
                return Err(CliError::new(
                    TRANSPORT_ERROR,
                    format!("device link lost: {}", session.label()),
                ));
            }
            Step::Stopped => break,
            Step::Dispatched(_) | Step::Skipped(_) | Step::Idle => {}
        }
    }

    let frames = session.frames_received();
    session.stop();
    info!(events = printed, frames, "monitor finished");
    Ok(SUCCESS)
}

fn install_ctrlc_handler(running: Arc<AtomicBool>, handle: SessionHandle) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
        handle.stop();
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
