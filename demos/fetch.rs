use std::{thread, time::Duration};

use codrive::{attempt, resolve, start, Computation, Settle, Task, Value, Yieldable};
use do_notation::m;

/// A pretend network request, answered from a timer thread
fn fetch(page: &'static str, ms: u64) -> Yieldable<Value, String> {
    Yieldable::deferred(move |settle: Settle<Value, String>| {
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(ms));
            match page {
                "missing" => settle.err(format!("{page}: not found")),
                _ => settle.ok(Value::from(format!("<{page}>"))),
            }
        });
    })
}

/// Fetches the index first, then every linked page at once
fn crawl() -> Computation<'static, Value, String> {
    m! {
        index <- resolve(fetch("index", 20));
        pages <- resolve(Yieldable::mapping([
            ("about", fetch("about", 30)),
            ("blog", fetch("blog", 10)),
        ]));
        missing <- attempt(fetch("missing", 5));
        let missing = missing.err().map(Value::from).unwrap_or_default();
        codrive::result(Value::List(vec![index, pages, missing]))
    }
}

/// This is a small crawler built from timer-backed operations, see crawl
pub fn main() {
    let crawler: Task<Value, String> = start(crawl).named("crawler");
    let report: Task<Value, String> = start(move || {
        let crawler = crawler.clone();
        resolve(Yieldable::nested(crawler)).map(|crawled| {
            let lines = crawled.into_list().into_iter().map(|v| Value::from(format!("{v:?}")));
            Value::List(lines.collect())
        })
    });

    match report.wait_timeout(Duration::from_secs(1)) {
        Ok(lines) => {
            for line in lines.into_list() {
                println!("{}", line.as_str().unwrap_or_default());
            }
        }
        Err(e) => match e.into_inner() {
            Some(reason) => println!("crawl failed: {reason}"),
            None => println!("crawl timed out"),
        },
    }
}
