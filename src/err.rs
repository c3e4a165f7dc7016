error_chain! {
    types {
        Error, ErrorKind, ResultExt, Result;
    }

    links {

    }

    foreign_links {
        Io(::std::io::Error);
        Toml(::toml::de::Error);
    }

    errors {
        InvalidSliceLength(expected: usize, actual: usize, ttype: &'static str) {
            description("Invalid slice length received."),
            display("Expected '{}' but got '{}' bytes for '{}'.", expected, actual, ttype),
        }

        UnknownValue(val: u64, ttype: &'static str) {
            description("Encountered unknown value."),
            display("Encountered unknown value '{}' for type '{}'.", val, ttype),
        }

        IllegalValue(val: u64, ttype: &'static str) {
            description("Encountered illegal value."),
            display("Encountered illegal value '{}' for type '{}'.", val, ttype),
        }

        UnsupportedValue(val: u64, ttype: &'static str) {
            description("Encountered unsupported value."),
            display("Encountered unsupported value '{}' for type '{}'.", val, ttype),
        }

        FrameTooLarge(len: usize) {
            description("Encoded frame exceeds the maximum OpenFlow message length."),
            display("Encoded frame of {} bytes exceeds 65535 bytes.", len),
        }

        // A single frame could not be decoded; the connection survives.
        MalformedMessage(reason: String) {
            description("Malformed OpenFlow message."),
            display("Malformed message: {}.", reason),
        }

        // The byte stream can no longer be split into frames.
        FramingCorruption(reason: String) {
            description("OpenFlow framing corrupted."),
            display("Framing corruption: {}.", reason),
        }

        VersionMismatch(ours: u8, theirs: u8) {
            description("OpenFlow version negotiation failed."),
            display(
                "Version mismatch: controller speaks 0x{:02x}, switch negotiated 0x{:02x}.",
                ours,
                theirs
            ),
        }

        // A packet-in whose frame could not be understood.
        MalformedPacket(reason: String) {
            description("Malformed packet-in payload."),
            display("Malformed packet: {}.", reason),
        }

        SessionNotReady(state: String) {
            description("Switch session is not established."),
            display("Session not ready (state {}).", state),
        }

        SessionClosing {
            description("Switch session is closing."),
            display("Session closing."),
        }

        BarrierTimeout {
            description("Barrier reply not received in time."),
            display("Barrier reply not received in time."),
        }

        UnknownSwitch(dpid: u64) {
            description("No session for datapath."),
            display("No active session for datapath {:016x}.", dpid),
        }

        LoopingRule(port: u32) {
            description("Flow rule would output to its own ingress port."),
            display("Refusing flow rule that outputs to its ingress port {}.", port),
        }

        InvalidConfig(reason: String) {
            description("Invalid configuration."),
            display("Invalid configuration: {}.", reason),
        }
    }
}
