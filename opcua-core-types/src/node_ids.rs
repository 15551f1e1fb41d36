use crate::node_id::NodeId;

macro_rules! id_enum {
    ($(#[$doc:meta])* $name:ident { $($variant:ident = $value:literal),+ $(,)? }) => {
        $(#[$doc])*
        #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
        #[repr(u32)]
        #[allow(missing_docs)]
        pub enum $name {
            $($variant = $value,)+
        }

        impl From<$name> for NodeId {
            fn from(id: $name) -> NodeId {
                NodeId::new(0, id as u32)
            }
        }

        impl PartialEq<NodeId> for $name {
            fn eq(&self, other: &NodeId) -> bool {
                other.namespace == 0 && other.as_u32() == Some(*self as u32)
            }
        }

        impl PartialEq<$name> for NodeId {
            fn eq(&self, other: &$name) -> bool {
                other == self
            }
        }
    };
}

id_enum! {
    /// Well known objects in the standard namespace.
    ObjectId {
        ObjectsFolder = 85,
        TypesFolder = 86,
        ViewsFolder = 87,
        RootFolder = 84,
        Server = 2253,
    }
}

id_enum! {
    /// Well known object types in the standard namespace.
    ObjectTypeId {
        BaseObjectType = 58,
        FolderType = 61,
        BaseEventType = 2041,
        AuditEventType = 2052,
        SystemEventType = 2130,
        EventQueueOverflowEventType = 3035,
        ProgressEventType = 11436,
        ConditionType = 2782,
    }
}

id_enum! {
    /// Well known reference types in the standard namespace.
    ReferenceTypeId {
        References = 31,
        NonHierarchicalReferences = 32,
        HierarchicalReferences = 33,
        HasChild = 34,
        Organizes = 35,
        HasModellingRule = 37,
        HasEncoding = 38,
        HasDescription = 39,
        HasTypeDefinition = 40,
        GeneratesEvent = 41,
        Aggregates = 44,
        HasSubtype = 45,
        HasProperty = 46,
        HasComponent = 47,
        HasNotifier = 48,
        HasOrderedComponent = 49,
        HasEventSource = 36,
    }
}

id_enum! {
    /// Well known variable types in the standard namespace.
    VariableTypeId {
        BaseVariableType = 62,
        BaseDataVariableType = 63,
        PropertyType = 68,
    }
}

id_enum! {
    /// Well known data types in the standard namespace.
    DataTypeId {
        Boolean = 1,
        SByte = 2,
        Byte = 3,
        Int16 = 4,
        UInt16 = 5,
        Int32 = 6,
        UInt32 = 7,
        Int64 = 8,
        UInt64 = 9,
        Float = 10,
        Double = 11,
        String = 12,
        DateTime = 13,
        Guid = 14,
        ByteString = 15,
        XmlElement = 16,
        NodeId = 17,
        StatusCode = 19,
        QualifiedName = 20,
        LocalizedText = 21,
        BaseDataType = 24,
        Number = 26,
        Integer = 27,
        UInteger = 28,
    }
}

id_enum! {
    /// Well known methods in the standard namespace.
    MethodId {
        Server_GetMonitoredItems = 11492,
        Server_ResendData = 12873,
    }
}

id_enum! {
    /// Well known variables in the standard namespace.
    VariableId {
        Server_ServerStatus = 2256,
        Server_ServerStatus_CurrentTime = 2258,
        Server_ServerDiagnostics_ServerDiagnosticsSummary = 2275,
    }
}
