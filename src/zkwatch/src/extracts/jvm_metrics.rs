use crate::extracts::{bean_attributes, compact_name, query_names, MetricWriter, MetricsCollector};
use crate::introspection::{AttributeValue, IntrospectionSession};
use anyhow::Result;
use async_trait::async_trait;

/// Platform groups every JVM exposes: memory, collectors, threads, buffer
/// pools, the JIT, class loading and the host OS.
pub struct JvmMetricsCollector;

impl JvmMetricsCollector {
    async fn memory_pools(
        session: &mut dyn IntrospectionSession,
        writer: &mut MetricWriter<'_>,
    ) -> Result<()> {
        for name in query_names(session, "java.lang:type=MemoryPool,name=*").await? {
            let attributes = bean_attributes(
                session,
                &name,
                &[
                    "Name",
                    "Usage",
                    "PeakUsage",
                    "CollectionUsage",
                    "UsageThreshold",
                    "UsageThresholdCount",
                    "UsageThresholdSupported",
                    "CollectionUsageThreshold",
                    "CollectionUsageThresholdCount",
                    "CollectionUsageThresholdSupported",
                    "Valid",
                ],
            )
            .await?;

            let Some(pool) = compact_name(&attributes) else {
                continue;
            };
            if attributes.get("Valid").and_then(AttributeValue::as_bool) != Some(true) {
                continue;
            }

            let base = format!("memoryPools.{}", pool);
            writer.usage(&format!("{}.collectionUsage", base), attributes.get("CollectionUsage"))?;
            writer.usage(&format!("{}.peakUsage", base), attributes.get("PeakUsage"))?;
            writer.usage(&format!("{}.usage", base), attributes.get("Usage"))?;

            let supported = |key: &str| attributes.get(key).and_then(AttributeValue::as_bool) == Some(true);
            if supported("UsageThresholdSupported") {
                writer.numeric(&format!("{}.usageThreshold", base), attributes.get("UsageThreshold"))?;
                writer.numeric(
                    &format!("{}.usageThresholdCount", base),
                    attributes.get("UsageThresholdCount"),
                )?;
            }
            if supported("CollectionUsageThresholdSupported") {
                writer.numeric(
                    &format!("{}.collectionUsageThreshold", base),
                    attributes.get("CollectionUsageThreshold"),
                )?;
                writer.numeric(
                    &format!("{}.collectionUsageThresholdCount", base),
                    attributes.get("CollectionUsageThresholdCount"),
                )?;
            }
        }
        Ok(())
    }

    async fn memory(session: &mut dyn IntrospectionSession, writer: &mut MetricWriter<'_>) -> Result<()> {
        let Some(name) = query_names(session, "java.lang:type=Memory").await?.into_iter().next() else {
            return Ok(());
        };
        let attributes = bean_attributes(
            session,
            &name,
            &["ObjectPendingFinalizationCount", "HeapMemoryUsage", "NonHeapMemoryUsage"],
        )
        .await?;

        writer.usage("memory.heap", attributes.get("HeapMemoryUsage"))?;
        writer.usage("memory.nonHeap", attributes.get("NonHeapMemoryUsage"))?;
        writer.numeric(
            "memory.objectPendingFinalizationCount",
            attributes.get("ObjectPendingFinalizationCount"),
        )?;
        Ok(())
    }

    async fn garbage_collectors(
        session: &mut dyn IntrospectionSession,
        writer: &mut MetricWriter<'_>,
    ) -> Result<()> {
        for name in query_names(session, "java.lang:type=GarbageCollector,name=*").await? {
            let attributes = bean_attributes(
                session,
                &name,
                &["Name", "CollectionCount", "CollectionTime", "Valid"],
            )
            .await?;

            let Some(gc) = compact_name(&attributes) else {
                continue;
            };
            if attributes.get("Valid").and_then(AttributeValue::as_bool) != Some(true) {
                continue;
            }
            writer.numeric(&format!("gc.{}.collectionCount", gc), attributes.get("CollectionCount"))?;
            writer.numeric(&format!("gc.{}.collectionTime", gc), attributes.get("CollectionTime"))?;
        }
        Ok(())
    }

    async fn buffer_pools(
        session: &mut dyn IntrospectionSession,
        writer: &mut MetricWriter<'_>,
    ) -> Result<()> {
        for name in query_names(session, "java.nio:type=BufferPool,name=*").await? {
            let attributes =
                bean_attributes(session, &name, &["Name", "Count", "TotalCapacity", "MemoryUsed"]).await?;
            let Some(pool) = compact_name(&attributes) else {
                continue;
            };
            writer.numeric(&format!("bufferPools.{}.count", pool), attributes.get("Count"))?;
            writer.numeric(
                &format!("bufferPools.{}.totalCapacity", pool),
                attributes.get("TotalCapacity"),
            )?;
            writer.numeric(&format!("bufferPools.{}.memoryUsed", pool), attributes.get("MemoryUsed"))?;
        }
        Ok(())
    }

    /// Singleton group whose attributes all map to integer gauges.
    async fn simple(
        session: &mut dyn IntrospectionSession,
        writer: &mut MetricWriter<'_>,
        pattern: &str,
        section: &str,
        fields: &[(&str, &str)],
    ) -> Result<()> {
        let Some(name) = query_names(session, pattern).await?.into_iter().next() else {
            return Ok(());
        };
        let requested: Vec<&str> = fields.iter().map(|(attribute, _)| *attribute).collect();
        let attributes = bean_attributes(session, &name, &requested).await?;
        for (attribute, metric) in fields {
            writer.numeric(&format!("{}.{}", section, metric), attributes.get(*attribute))?;
        }
        Ok(())
    }

    async fn operating_system(
        session: &mut dyn IntrospectionSession,
        writer: &mut MetricWriter<'_>,
    ) -> Result<()> {
        const FLOATING: [(&str, &str); 3] = [
            ("SystemLoadAverage", "systemLoadAverage"),
            ("ProcessCpuLoad", "processCpuLoad"),
            ("SystemCpuLoad", "systemCpuLoad"),
        ];
        const NUMERIC: [(&str, &str); 8] = [
            ("TotalPhysicalMemorySize", "totalPhysicalMemorySize"),
            ("FreePhysicalMemorySize", "freePhysicalMemorySize"),
            ("ProcessCpuTime", "processCpuTime"),
            ("FreeSwapSpaceSize", "freeSwapSpaceSize"),
            ("TotalSwapSpaceSize", "totalSwapSpaceSize"),
            ("CommittedVirtualMemorySize", "committedVirtualMemorySize"),
            ("MaxFileDescriptorCount", "maxFileDescriptorCount"),
            ("OpenFileDescriptorCount", "openFileDescriptorCount"),
        ];

        let Some(name) = query_names(session, "java.lang:type=OperatingSystem")
            .await?
            .into_iter()
            .next()
        else {
            return Ok(());
        };
        let requested: Vec<&str> = FLOATING
            .iter()
            .chain(NUMERIC.iter())
            .map(|(attribute, _)| *attribute)
            .collect();
        let attributes = bean_attributes(session, &name, &requested).await?;

        for (attribute, metric) in FLOATING {
            writer.floating(&format!("os.{}", metric), attributes.get(attribute))?;
        }
        for (attribute, metric) in NUMERIC {
            writer.numeric(&format!("os.{}", metric), attributes.get(attribute))?;
        }
        Ok(())
    }
}

#[async_trait]
impl MetricsCollector for JvmMetricsCollector {
    fn name(&self) -> &'static str {
        "jvm"
    }

    async fn collect(
        &self,
        session: &mut dyn IntrospectionSession,
        writer: &mut MetricWriter<'_>,
    ) -> Result<()> {
        Self::memory_pools(session, writer).await?;
        Self::memory(session, writer).await?;
        Self::garbage_collectors(session, writer).await?;
        Self::simple(
            session,
            writer,
            "java.lang:type=Threading",
            "thread",
            &[
                ("DaemonThreadCount", "daemonThreadCount"),
                ("PeakThreadCount", "peakThreadCount"),
                ("ThreadCount", "threadCount"),
                ("TotalStartedThreadCount", "totalStartedThreadCount"),
            ],
        )
        .await?;
        Self::buffer_pools(session, writer).await?;
        Self::simple(
            session,
            writer,
            "java.lang:type=Compilation",
            "compilation",
            &[("TotalCompilationTime", "totalCompilationTime")],
        )
        .await?;
        Self::simple(
            session,
            writer,
            "java.lang:type=ClassLoading",
            "classLoading",
            &[
                ("TotalLoadedClassCount", "totalLoadedClassCount"),
                ("LoadedClassCount", "loadedClassCount"),
                ("UnloadedClassCount", "unloadedClassCount"),
            ],
        )
        .await?;
        Self::operating_system(session, writer).await?;
        Ok(())
    }
}
