//! `tally demo`: Run a handle scenario step by step.

use crate::Scenario;
use std::fmt;
use tally_gc::Handle;

pub fn execute(scenario: Scenario) -> anyhow::Result<()> {
    log::debug!("running scenario {:?}", scenario);
    match scenario {
        Scenario::Copy => copy(),
        Scenario::Array => array(),
        Scenario::Reassign => reassign(),
        Scenario::Nested => nested(),
        Scenario::Exit => exit(),
    }
    Ok(())
}

fn step(label: &str) {
    println!("== {}", label);
}

fn copy() {
    step("construct a over a fresh integer");
    let a = Handle::new(42i32);
    Handle::<i32>::show_registry();

    step("clone b from a");
    let b = a.clone();
    Handle::<i32>::show_registry();

    step("drop b");
    drop(b);
    Handle::<i32>::show_registry();

    step("drop a");
    drop(a);
    Handle::<i32>::show_registry();
}

fn array() {
    step("construct c over a 5-element array");
    let c = Handle::<i32, 5>::from_array([1, 2, 3, 4, 5]);
    Handle::<i32, 5>::show_registry();

    println!("begin..end spans {} element(s)", c.end() - c.begin());
    let values: Vec<String> = c.iter().map(|v| v.to_string()).collect();
    println!("elements: {}", values.join(" "));

    let mut cursor = c.begin();
    cursor += 2;
    println!("begin + 2 -> {}", cursor.get().map(|v| v.to_string()).unwrap_or_default());
    match c.end().get() {
        Ok(v) => println!("end -> {}", v),
        Err(err) => println!("end -> {}", err),
    }

    step("drop c");
    drop(c);
    Handle::<i32, 5>::show_registry();
}

fn reassign() {
    step("construct d over Y and e over Z");
    let mut d = Handle::new(1i64);
    let e = Handle::new(2i64);
    Handle::<i64>::show_registry();

    step("assign d = e (Y released, not collected)");
    d.assign(&e);
    Handle::<i64>::show_registry();

    step("collect");
    let freed = Handle::<i64>::collect();
    println!("collected: {}", freed);
    Handle::<i64>::show_registry();

    step("drop d and e");
    drop(d);
    drop(e);
    Handle::<i64>::show_registry();
}

struct Link {
    id: u32,
    next: Option<Handle<Link>>,
}

impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.next {
            Some(next) => write!(f, "link {} -> {:p}", self.id, next),
            None => write!(f, "link {} (tail)", self.id),
        }
    }
}

fn nested() {
    step("build a chain of 4 links");
    let mut head = Handle::new(Link { id: 0, next: None });
    for id in 1..4 {
        head = Handle::new(Link {
            id,
            next: Some(head),
        });
    }
    Handle::<Link>::show_registry();

    let stats = Handle::<Link>::stats();
    println!("collections so far: {}", stats.collections);

    step("drop head (the whole chain is reclaimed)");
    drop(head);
    Handle::<Link>::show_registry();

    let stats = Handle::<Link>::stats();
    println!(
        "records reclaimed: {}, allocations freed: {}",
        stats.records_reclaimed, stats.allocations_freed
    );
}

struct Resource(&'static str);

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

impl Drop for Resource {
    fn drop(&mut self) {
        println!("released {}", self.0);
    }
}

fn exit() {
    step("construct a handle and never drop it");
    let handle = Handle::new(Resource("session"));
    Handle::<Resource>::show_registry();

    // Still counted when main returns; the exit hook frees it.
    std::mem::forget(handle);
    step("return from main");
}
