// RCON client, pool and pose query against a loopback fake server

use std::collections::HashSet;
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use anamorph_engine::config::RconConfig;
use anamorph_engine::gateway::pool::{ConnectionPool, RconSink};
use anamorph_engine::gateway::rcon::{Packet, RconClient, TYPE_AUTH_RESPONSE, TYPE_LOGIN, TYPE_RESPONSE};
use anamorph_engine::gateway::{CommandChannel, EntityPoseQuery};
use anamorph_engine::{BlockPos, CommandSink, DispatchReport, GatewayError, MaterialId, PlacementInstruction, PoseProvider, Vec3};

const PASSWORD: &str = "sesame";
const TIMEOUT: Duration = Duration::from_secs(5);

/// Misbehaviour injected into the fake server. Command numbers count
/// non-login packets across all connections, starting at 1.
#[derive(Clone, Copy, Default)]
struct Faults {
    /// Close the connection on reading this command, without running it
    hang_up_at: Option<usize>,
    /// Answer this command with a reply id that matches nothing
    wrong_id_at: Option<usize>,
    /// Accept a single connection, then stop listening
    accept_once: bool,
}

#[derive(Default)]
struct ServerState {
    received: Mutex<Vec<String>>,
    commands: AtomicUsize,
    connections: AtomicUsize,
}

struct FakeServer {
    port: u16,
    state: Arc<ServerState>,
}

impl FakeServer {
    fn start() -> Self {
        Self::start_with(Faults::default())
    }

    fn start_with(faults: Faults) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let state = Arc::new(ServerState::default());

        let shared = Arc::clone(&state);
        thread::spawn(move || {
            if faults.accept_once {
                let Ok((stream, _)) = listener.accept() else { return };
                drop(listener);
                shared.connections.fetch_add(1, Ordering::SeqCst);
                serve(stream, &shared, faults);
                return;
            }
            for stream in listener.incoming() {
                let Ok(stream) = stream else { break };
                shared.connections.fetch_add(1, Ordering::SeqCst);
                let shared = Arc::clone(&shared);
                thread::spawn(move || serve(stream, &shared, faults));
            }
        });

        Self { port, state }
    }

    fn config(&self, pool_size: usize) -> RconConfig {
        RconConfig {
            host: "127.0.0.1".into(),
            port: self.port,
            password: PASSWORD.into(),
            pool_size,
            timeout_ms: 5000,
        }
    }

    fn received(&self) -> Vec<String> {
        self.state.received.lock().unwrap().clone()
    }

    fn connections(&self) -> usize {
        self.state.connections.load(Ordering::SeqCst)
    }
}

fn serve(mut stream: TcpStream, state: &ServerState, faults: Faults) {
    while let Ok(packet) = Packet::read_from(&mut stream) {
        let reply = if packet.kind == TYPE_LOGIN {
            let id = if packet.body == PASSWORD { packet.id } else { -1 };
            Packet::new(id, TYPE_AUTH_RESPONSE, "")
        } else {
            let n = state.commands.fetch_add(1, Ordering::SeqCst) + 1;
            if faults.hang_up_at == Some(n) {
                return;
            }
            state.received.lock().unwrap().push(packet.body.clone());
            let body = match packet.body.as_str() {
                "data get entity Alex Pos" => "Alex has the following entity data: [1.5d, 70.0d, -2.25d]".to_string(),
                "data get entity Alex Rotation" => "Alex has the following entity data: [90.0f, -15.0f]".to_string(),
                cmd if cmd.starts_with("setblock ") => format!("Changed the block at {}", &cmd[9..]),
                _ => "Unknown or incomplete command".to_string(),
            };
            let id = if faults.wrong_id_at == Some(n) { packet.id + 1000 } else { packet.id };
            Packet::new(id, TYPE_RESPONSE, body)
        };
        if reply.write_to(&mut stream).is_err() {
            break;
        }
    }
}

fn instruction(x: i32, material: &str) -> PlacementInstruction {
    PlacementInstruction { position: BlockPos::new(x, 64, 0), material: MaterialId::new(material) }
}

#[test]
fn client_authenticates_and_runs_commands() {
    let server = FakeServer::start();
    let mut client = RconClient::connect(("127.0.0.1", server.port), PASSWORD, TIMEOUT).unwrap();

    let reply = client.command("setblock 1 2 3 minecraft:stone").unwrap();
    assert_eq!(reply, "Changed the block at 1 2 3 minecraft:stone");
    let reply = client.command("list").unwrap();
    assert_eq!(reply, "Unknown or incomplete command");
    assert_eq!(server.received(), ["setblock 1 2 3 minecraft:stone", "list"]);
}

#[test]
fn wrong_password_is_rejected() {
    let server = FakeServer::start();
    let result = RconClient::connect(("127.0.0.1", server.port), "guess", TIMEOUT);
    assert!(matches!(result, Err(GatewayError::AuthFailed)));
}

#[test]
fn oversized_command_is_refused_locally() {
    let server = FakeServer::start();
    let mut client = RconClient::connect(("127.0.0.1", server.port), PASSWORD, TIMEOUT).unwrap();
    let long = "x".repeat(2000);
    assert!(matches!(client.command(&long), Err(GatewayError::PacketTooLarge { len: 2000, .. })));
    assert!(server.received().is_empty());
}

#[test]
fn pose_query_over_rcon() {
    let server = FakeServer::start();
    let client = RconClient::connect(("127.0.0.1", server.port), PASSWORD, TIMEOUT).unwrap();
    let pose = EntityPoseQuery::new(client, "Alex").with_eye_height(1.5).viewer_pose().unwrap();

    assert_eq!(pose.position, Vec3::new(1.5, 71.5, -2.25));
    assert_eq!((pose.yaw, pose.pitch), (90.0, -15.0));
}

#[test]
fn sink_sends_every_instruction_once() {
    let server = FakeServer::start();
    let mut sink = RconSink::connect(server.config(4)).unwrap();
    assert_eq!(sink.pool().size(), 4);

    let insts: Vec<PlacementInstruction> = (0..200).map(|x| instruction(x, "minecraft:red_wool")).collect();
    let report = sink.dispatch(&insts).unwrap();
    assert_eq!(report.sent, 200);
    assert_eq!(report.failed, 0);

    let got: HashSet<String> = server.received().into_iter().collect();
    let want: HashSet<String> = insts.iter().map(|i| i.to_command()).collect();
    assert_eq!(got, want);
    assert_eq!(server.received().len(), 200);
}

#[test]
fn pool_fails_fast_when_server_is_gone() {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let config = RconConfig { host: "127.0.0.1".into(), port, password: PASSWORD.into(), pool_size: 2, timeout_ms: 500 };
    assert!(ConnectionPool::connect(config).is_err());
}

#[test]
fn dropped_connection_is_replaced_and_command_retried() {
    let server = FakeServer::start_with(Faults { hang_up_at: Some(3), ..Faults::default() });
    let mut sink = RconSink::connect(server.config(1)).unwrap();

    let insts: Vec<PlacementInstruction> = (0..6).map(|x| instruction(x, "minecraft:stone")).collect();
    let report = sink.dispatch(&insts).unwrap();
    assert_eq!(report, DispatchReport { sent: 6, failed: 0 });

    // The hung-up command was resent on a fresh connection
    let got: HashSet<String> = server.received().into_iter().collect();
    let want: HashSet<String> = insts.iter().map(|i| i.to_command()).collect();
    assert_eq!(got, want);
    assert_eq!(server.received().len(), 6);
    assert_eq!(server.connections(), 2);
    assert_eq!(sink.pool().live(), 1);
}

#[test]
fn out_of_sync_connection_is_not_reused() {
    let server = FakeServer::start_with(Faults { wrong_id_at: Some(2), ..Faults::default() });
    let mut sink = RconSink::connect(server.config(1)).unwrap();

    let insts: Vec<PlacementInstruction> = (0..5).map(|x| instruction(x, "minecraft:stone")).collect();
    let report = sink.dispatch(&insts).unwrap();
    assert_eq!(report, DispatchReport { sent: 5, failed: 0 });
    // Mismatched command ran once on each connection
    assert_eq!(server.received().len(), 6);
    assert_eq!(server.connections(), 2);
}

#[test]
fn commands_fail_once_every_connection_is_lost() {
    let server = FakeServer::start_with(Faults { hang_up_at: Some(5), accept_once: true, ..Faults::default() });
    let mut sink = RconSink::connect(server.config(1)).unwrap();

    let insts: Vec<PlacementInstruction> = (0..10).map(|x| instruction(x, "minecraft:stone")).collect();
    let report = sink.dispatch(&insts).unwrap();
    assert_eq!(report, DispatchReport { sent: 4, failed: 6 });
    assert_eq!(server.received().len(), 4);
    assert_eq!(sink.pool().live(), 0);
    assert!(sink.pool().get().is_err());
}
