use serde::{Deserialize, Serialize};

/// Serial communication registers. Only the register shape is emulated; no
/// link-cable traffic ever flows.
#[derive(Default, Serialize, Deserialize)]
pub struct Serial {
    /// SIODATA32 / SIOMULTI0-1, 0x04000120.
    pub sio_data32: u32,

    /// SIOMULTI2, 0x04000124.
    pub sio_multi_2: u16,

    /// SIOMULTI3, 0x04000126.
    pub sio_multi_3: u16,

    /// SIOCNT, 0x04000128.
    pub sio_control: u16,

    /// SIOMLT_SEND / SIODATA8, 0x0400012A.
    pub sio_send: u16,

    /// RCNT, 0x04000134.
    pub mode_select: u16,

    /// JOYCNT, 0x04000140.
    pub joy_control: u16,

    /// JOY_RECV, 0x04000150.
    pub joy_receive: u32,

    /// JOY_TRANS, 0x04000154.
    pub joy_transmit: u32,

    /// JOYSTAT, 0x04000158.
    pub joy_status: u16,
}
