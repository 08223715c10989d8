use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use ts6_link::config::Config;
use ts6_link::events::NoHooks;
use ts6_link::{NewClient, Session};
use ts6_proto::Line;

const CONFIG: &str = r#"
[server]
name = "services.example.net"
sid = "42X"
description = "Network Services"

[uplink]
name = "hub.example.net"
hostname = "127.0.0.1"
port = 6667
password = "linkpass"
"#;

// A linked session with one local client and one remote client sharing #bench.
fn linked_session() -> Session {
    let config = Config::parse(CONFIG).unwrap();
    let mut session = Session::new(&config, Box::new(NoHooks)).unwrap();
    session.connected().unwrap();
    for line in [
        "PASS linkpass TS 6 :1HB",
        "CAPAB :QS ENCAP EUID TB",
        "SERVER hub.example.net 1 :Hub",
        "PING :1HB",
        ":1HB EUID alice 1 1000 +i alice host 0 1HBAAAAAA * * :Alice",
    ] {
        session.handle_line(line).unwrap();
    }
    let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
    let uid = session
        .introduce(NewClient::new("bot", "bot", "h", "Bot"), Box::new(tx))
        .unwrap();
    session.join(&uid, "#bench").unwrap();
    session.handle_line(":1HBAAAAAA JOIN 1 #bench +").unwrap();
    session.take_output();
    session
}

fn line_parsing_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("parsing");
    let raw = ":1HB SJOIN 1700000000 #channel +ntk key :@1HBAAAAAA +1HBAAAAAB 1HBAAAAAC";
    group.throughput(Throughput::Bytes(raw.len() as u64));

    group.bench_function("parse_sjoin", |b| b.iter(|| raw.parse::<Line>().unwrap()));

    group.finish();
}

fn dispatch_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch");
    group.throughput(Throughput::Elements(1));

    let mut session = linked_session();
    group.bench_function("channel_privmsg", |b| {
        b.iter(|| {
            session
                .handle_line(":1HBAAAAAA PRIVMSG #bench :Hello world")
                .unwrap()
        })
    });

    let mut session = linked_session();
    group.bench_function("tmode_toggle", |b| {
        b.iter(|| {
            session.handle_line(":1HBAAAAAA TMODE 1 #bench +m").unwrap();
            session.handle_line(":1HBAAAAAA TMODE 1 #bench -m").unwrap();
        })
    });

    group.finish();
}

criterion_group!(benches, line_parsing_benchmark, dispatch_benchmark);
criterion_main!(benches);
