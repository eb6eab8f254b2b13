use criterion::{criterion_group, criterion_main, Criterion};

use msg2eml::convert::{ConversionStamp, Converter};
use msg2eml::model::attachment::SourceAttachment;
use msg2eml::model::message::{FieldValue, SourceMessage};
use msg2eml::parser::header::parse_header_block;

fn transport_block() -> String {
    let mut raw = String::new();
    for hop in 0..12 {
        raw.push_str(&format!(
            "Received: from relay{hop}.example.net ([198.51.100.{hop}])\r\n\
             \tby relay{}.example.net with ESMTPS; Tue, 2 Apr 2024 10:{hop:02}:00 +0000\r\n",
            hop + 1
        ));
    }
    raw.push_str("Subject: =?utf-8?b?w4lwaXNvZGUgMw==?=\r\nX-Mailer: Outlook\r\n\r\n");
    raw
}

fn sample_message() -> SourceMessage {
    SourceMessage {
        subject: Some(FieldValue::text("Episode 3")),
        sender_name: Some(FieldValue::text("Alice")),
        sender_smtp_address: Some(FieldValue::text("alice@example.com")),
        display_to: Some(FieldValue::text("bob@example.com; carol@example.com")),
        transport_headers: Some(FieldValue::text(transport_block())),
        body: Some(FieldValue::text("Plain body line.\r\n".repeat(200))),
        html_body: Some(FieldValue::Bytes(b"<p>HTML body line.</p>\r\n".repeat(200))),
        message_class: Some(FieldValue::text("IPM.Note")),
        sensitivity: Some(FieldValue::Integer(0)),
        attachments: vec![
            SourceAttachment::with_data("report.pdf", vec![0x25; 64 * 1024]),
            SourceAttachment::with_data("notes.txt", b"notes\n".repeat(100)),
        ],
        ..Default::default()
    }
}

fn bench_parse_header_block(c: &mut Criterion) {
    let raw = transport_block();
    c.bench_function("parse_transport_headers", |b| {
        b.iter(|| parse_header_block(&raw).len())
    });
}

fn bench_headers(c: &mut Criterion) {
    let msg = sample_message();
    let converter = Converter::default();
    let stamp = ConversionStamp::new();
    c.bench_function("reconcile_headers", |b| {
        b.iter(|| converter.headers(&msg, &stamp).len())
    });
}

fn bench_convert(c: &mut Criterion) {
    let msg = sample_message();
    let converter = Converter::default();
    let stamp = ConversionStamp::new();
    c.bench_function("convert_message", |b| {
        b.iter(|| converter.convert_with_stamp(&msg, &stamp).bytes.len())
    });
}

criterion_group!(benches, bench_parse_header_block, bench_headers, bench_convert);
criterion_main!(benches);
