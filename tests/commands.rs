//! Command lifecycle: gating, stopping, reconciliation and teardown.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use switchyard::{
    action_enum, command_enum, state_enum, CancelReason, Cleanup, Command, CommandCancel,
    CommandContext, GateRejection, Machine, MachineBuilder, MachineError, StateBuilder, Teardown,
};
use tokio::task::JoinHandle;

state_enum! {
    enum Conn {
        Offline,
        Online,
        Syncing,
        Failed,
    }
    error: [Failed]
}

action_enum! {
    enum Link {
        Connect,
        Disconnect,
        Begin,
        Done,
    }
}

command_enum! {
    enum Job {
        Upload,
        Heartbeat,
        Probe,
        Fire,
    }
}

type Cancels = Arc<Mutex<Vec<(String, CancelReason)>>>;

fn cancels() -> Cancels {
    Arc::new(Mutex::new(Vec::new()))
}

fn recorded(log: &Cancels) -> Vec<(String, CancelReason)> {
    log.lock().unwrap().clone()
}

fn cancel_into(log: &Cancels, tag: &str) -> CommandCancel {
    let log = Arc::clone(log);
    let tag = tag.to_string();
    Box::new(move |reason| log.lock().unwrap().push((tag, reason)))
}

fn tracking(
    log: &Cancels,
) -> impl Fn(Job, &CommandContext<Conn, Link, Job>) -> Option<CommandCancel> + Send + Sync + 'static
{
    let log = Arc::clone(log);
    move |job, _| Some(cancel_into(&log, job.name()))
}

fn conn_builder() -> MachineBuilder<Conn, Link, Job> {
    MachineBuilder::new()
        .initial(Conn::Online)
        .state(
            "Offline",
            StateBuilder::new()
                .to("Connect", Conn::Online)
                .commands(["Probe"]),
        )
        .state(
            "Online",
            StateBuilder::new()
                .to("Disconnect", Conn::Offline)
                .to("Begin", Conn::Syncing)
                .commands(["Upload", "Heartbeat", "Fire"]),
        )
        .state(
            "Syncing",
            StateBuilder::new()
                .to("Done", Conn::Online)
                .commands(["Heartbeat"]),
        )
        .state("Failed", StateBuilder::new().to("Connect", Conn::Online))
        .error_state(|_, _| Conn::Failed)
}

fn standard(log: &Cancels) -> Machine<Conn, Link, Job> {
    conn_builder()
        .command("Upload", tracking(log))
        .command("Heartbeat", tracking(log))
        .command("Fire", |_, _| None)
        .build()
        .unwrap()
}

#[test]
fn allowed_command_stops_exactly_once() {
    let log = cancels();
    let machine = standard(&log);

    let handle = machine.start(Job::Upload).unwrap();
    assert!(!handle.is_noop());
    assert_eq!(machine.running_commands(), 1);

    assert_eq!(handle.stop(), Ok(true));
    assert_eq!(handle.stop(), Ok(false));
    assert_eq!(machine.running_commands(), 0);
    assert_eq!(
        recorded(&log),
        vec![("Upload".to_string(), CancelReason::Stopped)]
    );
}

#[test]
fn machine_can_stop_by_id() {
    let log = cancels();
    let machine = standard(&log);

    let first = machine.start(Job::Heartbeat).unwrap();
    let second = machine.start(Job::Heartbeat).unwrap();
    assert_ne!(first.id(), second.id());
    assert_eq!(machine.running_commands(), 2);

    assert_eq!(machine.stop(second.id().unwrap()), Ok(true));
    assert_eq!(machine.running_commands(), 1);
    assert_eq!(first.stop(), Ok(true));
}

#[test]
fn rejected_commands_never_run() {
    let runs = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&runs);
    let machine = conn_builder()
        .command("Upload", move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            None
        })
        .build()
        .unwrap();

    machine.dispatch(Link::Disconnect).unwrap();
    let handle = machine.start(Job::Upload).unwrap();

    assert!(handle.is_noop());
    assert_eq!(handle.id(), None);
    assert_eq!(handle.stop(), Ok(false));
    assert_eq!(runs.load(Ordering::SeqCst), 0);
    assert_eq!(machine.running_commands(), 0);
}

#[test]
fn strict_rejections_explain_themselves() {
    let log = cancels();
    let reason = |machine: &Machine<Conn, Link, Job>, job: Job| match machine.start(job) {
        Err(MachineError::UnhandledCommand { reason, .. }) => Some(reason),
        _ => None,
    };

    let machine = conn_builder()
        .command("Upload", tracking(&log))
        .strict(true)
        .build()
        .unwrap();
    machine.dispatch(Link::Disconnect).unwrap();
    assert_eq!(
        machine.start(Job::Upload).unwrap_err(),
        MachineError::UnhandledCommand {
            state: "Offline".to_string(),
            command: "Upload".to_string(),
            reason: GateRejection::NotAllowed,
        }
    );
    assert_eq!(reason(&machine, Job::Probe), Some(GateRejection::NotRegistered));

    let machine = conn_builder()
        .initial(Conn::Failed)
        .command("Upload", tracking(&log))
        .strict(true)
        .build()
        .unwrap();
    assert_eq!(reason(&machine, Job::Upload), Some(GateRejection::NoAllowList));
}

#[test]
fn command_without_cancel_cannot_be_stopped() {
    let log = cancels();
    let machine = standard(&log);

    let handle = machine.start(Job::Fire).unwrap();

    assert!(handle.id().is_some());
    assert_eq!(machine.running_commands(), 0);
    assert_eq!(
        handle.stop(),
        Err(MachineError::CommandNotCancellable {
            command: "Fire".to_string()
        })
    );
    assert_eq!(
        machine.stop(handle.id().unwrap()),
        Err(MachineError::CommandNotCancellable {
            command: "Fire".to_string()
        })
    );
}

#[test]
fn stopping_before_registration_is_an_error() {
    let log = cancels();
    let seen = Arc::new(Mutex::new(None));
    let slot = Arc::clone(&seen);
    let cancel_log = Arc::clone(&log);
    let machine = conn_builder()
        .command("Upload", move |_, ctx| {
            if let Some(machine) = ctx.dispatcher().machine() {
                *slot.lock().unwrap() = Some((ctx.id(), machine.stop(ctx.id())));
            }
            Some(cancel_into(&cancel_log, "Upload"))
        })
        .build()
        .unwrap();

    let handle = machine.start(Job::Upload).unwrap();

    let (id, result) = seen.lock().unwrap().take().unwrap();
    assert_eq!(result, Err(MachineError::StopBeforeRegistered { id }));
    assert_eq!(handle.id(), Some(id));
    assert_eq!(handle.stop(), Ok(true));
    assert_eq!(
        recorded(&log),
        vec![("Upload".to_string(), CancelReason::Stopped)]
    );
}

#[test]
fn transition_cancels_only_disallowed_commands() {
    let log = cancels();
    let machine = standard(&log);

    machine.start(Job::Upload).unwrap();
    let heartbeat = machine.start(Job::Heartbeat).unwrap();

    machine.dispatch(Link::Begin).unwrap();
    assert_eq!(
        recorded(&log),
        vec![(
            "Upload".to_string(),
            CancelReason::Transition {
                to: "Syncing".to_string()
            }
        )]
    );
    assert_eq!(machine.running_commands(), 1);

    machine.dispatch(Link::Done).unwrap();
    assert_eq!(machine.running_commands(), 1);

    machine.dispatch(Link::Disconnect).unwrap();
    assert_eq!(machine.running_commands(), 0);
    assert_eq!(
        recorded(&log).last(),
        Some(&(
            "Heartbeat".to_string(),
            CancelReason::Transition {
                to: "Offline".to_string()
            }
        ))
    );
    assert_eq!(heartbeat.stop(), Ok(false));
}

#[test]
fn command_revoked_while_registering_is_cancelled_on_return() {
    let log = cancels();
    let cancel_log = Arc::clone(&log);
    let machine = conn_builder()
        .command("Upload", move |_, ctx| {
            ctx.dispatch(Link::Disconnect).unwrap();
            Some(cancel_into(&cancel_log, "Upload"))
        })
        .build()
        .unwrap();

    let handle = machine.start(Job::Upload).unwrap();

    assert_eq!(*machine.get_state(), Conn::Offline);
    assert_eq!(machine.running_commands(), 0);
    assert_eq!(
        recorded(&log),
        vec![(
            "Upload".to_string(),
            CancelReason::Transition {
                to: "Offline".to_string()
            }
        )]
    );
    assert_eq!(handle.stop(), Ok(false));
}

#[test]
fn finished_commands_are_forgotten() {
    let log = cancels();
    let contexts = Arc::new(Mutex::new(Vec::new()));
    let slot = Arc::clone(&contexts);
    let (upload_log, heartbeat_log) = (Arc::clone(&log), Arc::clone(&log));
    let machine = conn_builder()
        .command("Upload", move |_, ctx| {
            slot.lock().unwrap().push(ctx.clone());
            Some(cancel_into(&upload_log, "Upload"))
        })
        .command("Heartbeat", move |_, ctx| {
            assert!(ctx.finish());
            Some(cancel_into(&heartbeat_log, "Heartbeat"))
        })
        .build()
        .unwrap();

    let upload = machine.start(Job::Upload).unwrap();
    let context = contexts.lock().unwrap()[0].clone();
    assert_eq!(context.tag(), "Upload");
    assert_eq!(context.id(), upload.id().unwrap());
    assert_eq!(context.get_state().as_deref(), Some(&Conn::Online));

    assert!(context.finish());
    assert!(!context.finish());
    assert_eq!(machine.running_commands(), 0);

    machine.start(Job::Heartbeat).unwrap();
    assert_eq!(machine.running_commands(), 0);

    machine.dispatch(Link::Disconnect).unwrap();
    assert_eq!(upload.stop(), Ok(false));
    assert!(recorded(&log).is_empty());
}

#[test]
fn destroy_cancels_every_command() {
    let log = cancels();
    let machine = standard(&log);
    let upload = machine.start(Job::Upload).unwrap();
    machine.start(Job::Heartbeat).unwrap();

    machine.destroy().unwrap();

    assert_eq!(
        recorded(&log),
        vec![
            ("Upload".to_string(), CancelReason::Destroyed),
            ("Heartbeat".to_string(), CancelReason::Destroyed),
        ]
    );
    assert_eq!(machine.running_commands(), 0);
    assert_eq!(upload.stop(), Ok(false));
    assert_eq!(machine.stop(upload.id().unwrap()), Ok(false));
    assert!(machine.start(Job::Upload).unwrap().is_noop());
}

#[test]
fn strict_destroyed_machine_refuses_commands() {
    let log = cancels();
    let machine = conn_builder()
        .command("Upload", tracking(&log))
        .strict(true)
        .build()
        .unwrap();
    machine.destroy().unwrap();

    assert_eq!(
        machine.start(Job::Upload).unwrap_err(),
        MachineError::Destroyed { operation: "start" }
    );
}

/// Online refuses to tear down its effect; Offline's reaction starts Probe
/// and then dispatches `after`, if any.
fn sticky_online(log: &Cancels, after: Option<Link>) -> MachineBuilder<Conn, Link, Job> {
    MachineBuilder::new()
        .initial(Conn::Online)
        .state(
            "Online",
            StateBuilder::new()
                .to("Disconnect", Conn::Offline)
                .effect(|_| Some(Cleanup::vetoable(|| Teardown::Veto))),
        )
        .state(
            "Offline",
            StateBuilder::new()
                .to("Connect", Conn::Online)
                .commands(["Probe"])
                .reaction(move |ctx| {
                    ctx.dispatcher().start(Job::Probe).unwrap();
                    if let Some(next) = after {
                        ctx.dispatch(next).unwrap();
                    }
                }),
        )
        .error_state(|_, _| Conn::Failed)
        .command("Probe", tracking(log))
}

#[test]
fn vetoed_transition_cancels_commands_started_on_the_way() {
    let log = cancels();
    let machine = sticky_online(&log, None)
        .vetoable_cleanup(true)
        .build()
        .unwrap();

    machine.dispatch(Link::Disconnect).unwrap();

    assert_eq!(*machine.get_state(), Conn::Online);
    assert_eq!(machine.running_commands(), 0);
    assert_eq!(
        recorded(&log),
        vec![(
            "Probe".to_string(),
            CancelReason::Transition {
                to: "Online".to_string()
            }
        )]
    );
}

#[test]
fn rolled_back_drain_cancels_commands_started_on_the_way() {
    let log = cancels();
    let machine = sticky_online(&log, Some(Link::Begin))
        .strict(true)
        .build()
        .unwrap();

    let result = machine.dispatch(Link::Disconnect);

    assert!(matches!(
        result,
        Err(MachineError::UnhandledAction { ref state, .. }) if state == "Offline"
    ));
    assert_eq!(*machine.get_state(), Conn::Online);
    assert_eq!(machine.running_commands(), 0);
    assert_eq!(
        recorded(&log),
        vec![(
            "Probe".to_string(),
            CancelReason::Transition {
                to: "Online".to_string()
            }
        )]
    );
}

#[tokio::test]
async fn async_command_reports_back_through_its_context() {
    let log = cancels();
    let cancel_log = Arc::clone(&log);
    let (done_tx, done_rx) = tokio::sync::oneshot::channel();
    let done_tx = Arc::new(Mutex::new(Some(done_tx)));
    let machine = conn_builder()
        .command("Upload", move |_, ctx| {
            let ctx = ctx.clone();
            let done = done_tx.lock().unwrap().take();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                ctx.finish();
                ctx.dispatch(Link::Begin).unwrap();
                if let Some(done) = done {
                    let _ = done.send(());
                }
            });
            Some(cancel_into(&cancel_log, "Upload"))
        })
        .build()
        .unwrap();

    machine.start(Job::Upload).unwrap();
    assert_eq!(machine.running_commands(), 1);

    done_rx.await.unwrap();

    assert_eq!(*machine.get_state(), Conn::Syncing);
    assert_eq!(machine.running_commands(), 0);
    assert!(recorded(&log).is_empty());
}

#[tokio::test]
async fn cancelling_an_async_command_aborts_its_task() {
    let tasks: Arc<Mutex<Vec<JoinHandle<()>>>> = Arc::new(Mutex::new(Vec::new()));
    let slot = Arc::clone(&tasks);
    let machine = conn_builder()
        .command("Upload", move |_, _| {
            let task = tokio::spawn(async {
                tokio::time::sleep(Duration::from_secs(60)).await;
            });
            let abort = task.abort_handle();
            slot.lock().unwrap().push(task);
            let cancel: CommandCancel = Box::new(move |_| abort.abort());
            Some(cancel)
        })
        .build()
        .unwrap();

    machine.start(Job::Upload).unwrap();
    machine.dispatch(Link::Disconnect).unwrap();

    let task = tasks.lock().unwrap().pop().unwrap();
    assert!(task.await.unwrap_err().is_cancelled());
}
