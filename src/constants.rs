//! Well-known numeric identifiers the runtime stamps into counter and
//! annotation entries.

/// Human name of a system counter id carried in a COUNTER entry's `arg1`.
pub fn counter_name(id: i32) -> Option<&'static str> {
    Some(match id {
        9240581 => "THREAD_CPU_TIME",
        9240612 => "LOADAVG_1M",
        9240613 => "LOADAVG_5M",
        9240614 => "LOADAVG_15M",
        9240615 => "TOTAL_MEM",
        9240616 => "FREE_MEM",
        9240617 => "SHARED_MEM",
        9240618 => "BUFFER_MEM",
        9240619 => "NUM_PROCS",
        9240582 => "QL_THREAD_FAULTS_MAJOR",
        9240621 => "ALLOC_MMAP_BYTES",
        9240622 => "ALLOC_MAX_BYTES",
        9240623 => "ALLOC_TOTAL_BYTES",
        9240624 => "ALLOC_FREE_BYTES",
        9240579 => "PROC_CPU_TIME",
        9240580 => "PROC_SW_FAULTS_MAJOR",
        9240593 => "GLOBAL_ALLOC_COUNT",
        9240594 => "GLOBAL_ALLOC_SIZE",
        9240595 => "GLOBAL_GC_INVOCATION_SIZE",
        9240626 => "THREAD_WAIT_IN_RUNQUEUE_TIME",
        9240628 => "CONTEXT_SWITCHES_VOLUNTARY",
        9240629 => "CONTEXT_SWITCHES_INVOLUNTARY",
        9240630 => "IOWAIT_COUNT",
        9240631 => "IOWAIT_TIME",
        8126501 => "AVAILABLE_COUNTERS",
        9240634 => "JAVA_FREE_BYTES",
        9240635 => "JAVA_MAX_BYTES",
        9240636 => "JAVA_ALLOC_BYTES",
        9240637 => "JAVA_TOTAL_BYTES",
        _ => return None,
    })
}

/// Human name of an annotation id carried in a TRACE_ANNOTATION entry.
pub fn annotation_name(id: i32) -> Option<&'static str> {
    Some(match id {
        8126491 => "PROF_ERR_SIG_CRASHES",
        8126492 => "PROF_ERR_SLOT_MISSES",
        8126493 => "PROF_ERR_STACK_OVERFLOWS",
        _ => return None,
    })
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn known_ids() {
        assert_eq!(counter_name(9240619), Some("NUM_PROCS"));
        assert_eq!(counter_name(0), None);
        assert_eq!(annotation_name(8126492), Some("PROF_ERR_SLOT_MISSES"));
        assert_eq!(annotation_name(1), None);
    }
}
