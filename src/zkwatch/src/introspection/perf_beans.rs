//! Maps HotSpot performance counters onto the `java.lang` attribute groups.

use crate::introspection::hsperf::PerfData;
use crate::introspection::object_name::ObjectName;
use crate::introspection::value::{memory_usage, AttributeValue};
use std::collections::{BTreeMap, HashMap};

pub(crate) type Attributes = HashMap<String, AttributeValue>;
pub(crate) type Beans = BTreeMap<ObjectName, Attributes>;

const JAVA_LANG: &str = "java.lang";

#[derive(Debug, Clone, Copy, Default)]
struct Usage {
    init: i64,
    used: i64,
    committed: i64,
    max: i64,
}

impl Usage {
    fn add(self, other: Usage) -> Usage {
        Usage {
            init: self.init + other.init,
            used: self.used + other.used,
            committed: self.committed + other.committed,
            max: self.max + other.max,
        }
    }

    fn value(self) -> AttributeValue {
        memory_usage(self.init, self.used, self.committed, self.max)
    }
}

fn attrs<const N: usize>(entries: [(&str, Option<AttributeValue>); N]) -> Attributes {
    entries
        .into_iter()
        .filter_map(|(k, v)| v.map(|v| (k.to_string(), v)))
        .collect()
}

fn int(value: Option<i64>) -> Option<AttributeValue> {
    value.map(|v| AttributeValue::Int(i32::try_from(v).unwrap_or(i32::MAX)))
}

fn long(value: Option<i64>) -> Option<AttributeValue> {
    value.map(AttributeValue::Long)
}

/// Management name of a collector, from its perf counter name.
fn collector_name(perf_name: &str) -> String {
    match perf_name {
        "Copy" => "Copy".into(),
        "MSC" => "MarkSweepCompact".into(),
        "PSScavenge" => "PS Scavenge".into(),
        "PSParallelCompact" => "PS MarkSweep".into(),
        "PCopy" => "ParNew".into(),
        "CMS" => "ConcurrentMarkSweep".into(),
        n if n.starts_with("G1") && n.contains("full") => "G1 Old Generation".into(),
        n if n.starts_with("G1") && n.contains("concurrent") => "G1 Concurrent GC".into(),
        n if n.starts_with("G1") => "G1 Young Generation".into(),
        other => other.to_string(),
    }
}

/// Names of the eden, survivor and old pools for the collector family in use.
fn heap_pool_names(young_collector: &str) -> [&'static str; 3] {
    match young_collector {
        n if n.starts_with("G1") => ["G1 Eden Space", "G1 Survivor Space", "G1 Old Gen"],
        "PSScavenge" => ["PS Eden Space", "PS Survivor Space", "PS Old Gen"],
        "PCopy" => ["Par Eden Space", "Par Survivor Space", "CMS Old Gen"],
        _ => ["Eden Space", "Survivor Space", "Tenured Gen"],
    }
}

fn space_usage(perf: &PerfData, generation: usize, space: usize) -> Option<Usage> {
    let key = |field: &str| format!("sun.gc.generation.{}.space.{}.{}", generation, space, field);
    Some(Usage {
        init: perf.long(&key("initCapacity")).unwrap_or(0),
        used: perf.long(&key("used"))?,
        committed: perf.long(&key("capacity"))?,
        max: perf.long(&key("maxCapacity")).unwrap_or(-1),
    })
}

fn region_usage(perf: &PerfData, region: &str) -> Option<Usage> {
    let key = |field: &str| format!("sun.gc.{}.{}", region, field);
    Some(Usage {
        init: perf.long(&key("minCapacity")).unwrap_or(0),
        used: perf.long(&key("used"))?,
        committed: perf.long(&key("capacity"))?,
        max: perf.long(&key("maxCapacity")).unwrap_or(-1),
    })
}

fn pool_bean(beans: &mut Beans, name: &str, usage: Usage) {
    let object_name = ObjectName::new(JAVA_LANG, [("type", "MemoryPool"), ("name", name)]);
    beans.insert(
        object_name,
        attrs([
            ("Name", Some(AttributeValue::Text(name.to_string()))),
            ("Valid", Some(AttributeValue::Bool(true))),
            ("Usage", Some(usage.value())),
        ]),
    );
}

/// Builds every `java.lang` group the counters allow. Groups whose counters are
/// absent (other collectors, older JVMs) are left out.
pub(crate) fn jvm_beans(perf: &PerfData) -> Beans {
    let mut beans = Beans::new();

    beans.insert(
        ObjectName::new(JAVA_LANG, [("type", "Threading")]),
        attrs([
            ("ThreadCount", int(perf.long("java.threads.live"))),
            ("DaemonThreadCount", int(perf.long("java.threads.daemon"))),
            ("PeakThreadCount", int(perf.long("java.threads.livePeak"))),
            ("TotalStartedThreadCount", long(perf.long("java.threads.started"))),
        ]),
    );

    if let Some(loaded) = perf.long("java.cls.loadedClasses") {
        let total = loaded + perf.long("java.cls.sharedLoadedClasses").unwrap_or(0);
        let unloaded = perf.long("java.cls.unloadedClasses").unwrap_or(0)
            + perf.long("java.cls.sharedUnloadedClasses").unwrap_or(0);
        beans.insert(
            ObjectName::new(JAVA_LANG, [("type", "ClassLoading")]),
            attrs([
                ("TotalLoadedClassCount", long(Some(total))),
                ("LoadedClassCount", int(Some(total - unloaded))),
                ("UnloadedClassCount", long(Some(unloaded))),
            ]),
        );
    }

    if let Some(ticks) = perf.long("java.ci.totalTime") {
        beans.insert(
            ObjectName::new(JAVA_LANG, [("type", "Compilation")]),
            attrs([("TotalCompilationTime", long(perf.ticks_to_millis(ticks)))]),
        );
    }

    let mut young_collector = String::new();
    for index in 0.. {
        let Some(perf_name) = perf.text(&format!("sun.gc.collector.{}.name", index)) else {
            break;
        };
        if index == 0 {
            young_collector = perf_name.to_string();
        }
        let name = collector_name(perf_name);
        let time = perf
            .long(&format!("sun.gc.collector.{}.time", index))
            .and_then(|ticks| perf.ticks_to_millis(ticks));
        beans.insert(
            ObjectName::new(JAVA_LANG, [("type", "GarbageCollector"), ("name", name.as_str())]),
            attrs([
                ("Name", Some(AttributeValue::Text(name.clone()))),
                ("Valid", Some(AttributeValue::Bool(true))),
                (
                    "CollectionCount",
                    long(perf.long(&format!("sun.gc.collector.{}.invocations", index))),
                ),
                ("CollectionTime", long(time)),
            ]),
        );
    }

    let [eden_name, survivor_name, old_name] = heap_pool_names(&young_collector);
    let mut heap: Option<Usage> = None;
    let mut add_heap = |usage: Usage| heap = Some(heap.unwrap_or_default().add(usage));

    if let Some(eden) = space_usage(perf, 0, 0) {
        pool_bean(&mut beans, eden_name, eden);
        add_heap(eden);
    }
    let survivors: Vec<Usage> = [1, 2]
        .into_iter()
        .filter_map(|space| space_usage(perf, 0, space))
        .collect();
    if !survivors.is_empty() {
        let survivor = survivors.into_iter().fold(Usage::default(), Usage::add);
        pool_bean(&mut beans, survivor_name, survivor);
        add_heap(survivor);
    }
    if let Some(old) = space_usage(perf, 1, 0) {
        pool_bean(&mut beans, old_name, old);
        add_heap(old);
    }

    let mut non_heap: Option<Usage> = None;
    for (region, pool_name) in [
        ("metaspace", "Metaspace"),
        ("compressedclassspace", "Compressed Class Space"),
    ] {
        if let Some(usage) = region_usage(perf, region) {
            pool_bean(&mut beans, pool_name, usage);
            non_heap = Some(non_heap.unwrap_or_default().add(usage));
        }
    }

    if heap.is_some() || non_heap.is_some() {
        beans.insert(
            ObjectName::new(JAVA_LANG, [("type", "Memory")]),
            attrs([
                ("HeapMemoryUsage", heap.map(Usage::value)),
                ("NonHeapMemoryUsage", non_heap.map(Usage::value)),
            ]),
        );
    }

    beans
}
