#![allow(dead_code)]

use ccsds_telemetry::crc;
use ccsds_telemetry::framing::{FrameView, PacketSink, Vcid, CHEOPS_SCID};
use ccsds_telemetry::spacepacket::{Apid, ExtractedPacket, Packet};
use tracing_subscriber::EnvFilter;

/// Length of the frames produced by [frame].
pub const FRAME_LEN: usize = 1115;
/// Length of the data zone of the frames produced by [frame].
pub const ZONE_LEN: usize = FRAME_LEN - 10 - 4;

/// Send extraction diagnostics to the test output, filtered using `CCSDS_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("CCSDS_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_test_writer()
        .try_init();
}

/// CHEOPS frame with an OCF trailer and `data` at the start of its zero filled data zone.
pub fn frame(vcid: Vcid, vcfc: u8, fhp: u16, data: &[u8]) -> Vec<u8> {
    assert!(data.len() <= ZONE_LEN, "data does not fit in a frame");
    let id = (CHEOPS_SCID << 4) | (u16::from(vcid) << 1) | 0x1;
    let flags = 0x9800 | fhp;

    let mut dat = Vec::with_capacity(FRAME_LEN);
    dat.extend_from_slice(&id.to_be_bytes());
    dat.extend_from_slice(&[vcfc, vcfc]);
    dat.extend_from_slice(&flags.to_be_bytes());
    dat.extend_from_slice(&[0x03, 0x00, 0x00, 0x00]);
    dat.extend_from_slice(data);
    dat.resize(FRAME_LEN, 0);
    dat
}

/// Housekeeping packet with a valid error control field.
pub fn packet(apid: Apid, seq: u16, payload: &[u8]) -> Vec<u8> {
    let length = u16::try_from(16 + payload.len() + 2 - 7).unwrap();
    let mut dat = Vec::new();
    dat.extend_from_slice(&(0x0800 | apid).to_be_bytes());
    dat.extend_from_slice(&(0xc000 | seq).to_be_bytes());
    dat.extend_from_slice(&length.to_be_bytes());
    #[rustfmt::skip]
    let dfh = [
        0x10, 0x03, 0x19, 0x00,             // service 3/25, destination 0
        0x00, 0x00, 0x12, 0x34, 0x56, 0x79, // onboard time
    ];
    dat.extend_from_slice(&dfh);
    dat.extend_from_slice(payload);
    let pec = crc::compute(&dat);
    dat.extend_from_slice(&pec.to_be_bytes());
    dat
}

/// Packet of exactly `len` bytes.
pub fn packet_of_len(seq: u16, len: usize) -> Vec<u8> {
    packet(0x100, seq, &vec![0xaa; len - 18])
}

/// Lay `packets` out back to back across as many frames as needed, setting the first
/// header pointer of every frame.
pub fn pack_frames(vcid: Vcid, first_vcfc: u8, packets: &[Vec<u8>]) -> Vec<Vec<u8>> {
    let mut stream = Vec::new();
    let mut starts = Vec::new();
    for packet in packets {
        starts.push(stream.len());
        stream.extend_from_slice(packet);
    }

    stream
        .chunks(ZONE_LEN)
        .enumerate()
        .map(|(i, chunk)| {
            let lo = i * ZONE_LEN;
            let fhp = starts
                .iter()
                .find(|s| (lo..lo + ZONE_LEN).contains(*s))
                .map_or(FrameView::FHP_NO_PACKET_START, |s| {
                    u16::try_from(s - lo).unwrap()
                });
            frame(vcid, first_vcfc.wrapping_add(i as u8), fhp, chunk)
        })
        .collect()
}

/// Sink collecting owned copies of every packet.
#[derive(Debug, Default)]
pub struct Collect(pub Vec<Packet>);

impl PacketSink for Collect {
    fn accept(&mut self, packet: ExtractedPacket<'_>) {
        packet.view().validate().expect("extracted packet should be valid");
        self.0.push(packet.into_packet());
    }
}
