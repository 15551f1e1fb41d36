use bitflags::bitflags;

bitflags! {
    /// The access level of a variable node.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
    pub struct AccessLevel: u8 {
        /// The current value may be read.
        const CURRENT_READ = 1;
        /// The current value may be written.
        const CURRENT_WRITE = 2;
        /// History may be read.
        const HISTORY_READ = 4;
        /// History may be written.
        const HISTORY_WRITE = 8;
    }
}

bitflags! {
    /// Which attributes of a node a client may write.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
    pub struct WriteMask: u32 {
        /// The AccessLevel attribute is writable.
        const ACCESS_LEVEL = 1 << 0;
        /// The BrowseName attribute is writable.
        const BROWSE_NAME = 1 << 2;
        /// The Description attribute is writable.
        const DESCRIPTION = 1 << 5;
        /// The DisplayName attribute is writable.
        const DISPLAY_NAME = 1 << 6;
        /// The EventNotifier attribute is writable.
        const EVENT_NOTIFIER = 1 << 7;
        /// The Executable attribute is writable.
        const EXECUTABLE = 1 << 8;
        /// The Historizing attribute is writable.
        const HISTORIZING = 1 << 9;
        /// The IsAbstract attribute is writable.
        const IS_ABSTRACT = 1 << 11;
        /// The MinimumSamplingInterval attribute is writable.
        const MINIMUM_SAMPLING_INTERVAL = 1 << 12;
        /// The ValueRank attribute is writable.
        const VALUE_RANK = 1 << 19;
        /// The WriteMask attribute is writable.
        const WRITE_MASK = 1 << 20;
        /// The Value attribute of a variable type is writable.
        const VALUE_FOR_VARIABLE_TYPE = 1 << 21;
    }
}

bitflags! {
    /// The event notifier byte of objects and views.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
    pub struct EventNotifier: u8 {
        /// Events of the node may be subscribed to.
        const SUBSCRIBE_TO_EVENTS = 1;
        /// Event history may be read.
        const HISTORY_READ = 4;
        /// Event history may be written.
        const HISTORY_WRITE = 8;
    }
}
