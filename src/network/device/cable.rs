use std::collections::HashMap;

use tokio::sync::mpsc;

/// A frame in flight: the port it arrives on and its bytes.
pub type Delivery = (usize, Vec<u8>);

/// Transmits frames out of a device's ports. Best effort; nothing is confirmed.
pub trait Link {
    fn send(&mut self, port: usize, bytes: Vec<u8>);
}

/// Captures everything sent, in order. Useful when no peer is attached.
impl Link for Vec<Delivery> {
    fn send(&mut self, port: usize, bytes: Vec<u8>) {
        self.push((port, bytes));
    }
}

/// The far end of a cable: frames sent into it arrive at a device's inbox on `port`.
#[derive(Debug, Clone)]
pub struct Jack {
    inbox: mpsc::UnboundedSender<Delivery>,
    port: usize,
}

/// Receives frames arriving on any of a device's ports, in arrival order.
#[derive(Debug)]
pub struct Inbox {
    rx: mpsc::UnboundedReceiver<Delivery>,
}

impl Inbox {
    /// Waits for the next frame. None once the device and every cable into it are gone.
    pub async fn receive(&mut self) -> Option<Delivery> {
        self.rx.recv().await
    }

    /// Returns every frame that has already arrived without waiting.
    pub fn drain(&mut self) -> Vec<Delivery> {
        let mut frames = vec![];
        while let Ok(frame) = self.rx.try_recv() {
            frames.push(frame);
        }
        frames
    }
}

/// The ports of one device and the cables plugged into them.
///
/// A port with nothing plugged in silently drops what is sent on it.
#[derive(Debug)]
pub struct PatchPanel {
    inbox: mpsc::UnboundedSender<Delivery>,
    cables: HashMap<usize, Jack>,
}

impl PatchPanel {
    pub fn new() -> (PatchPanel, Inbox) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            PatchPanel {
                inbox: tx,
                cables: HashMap::new(),
            },
            Inbox { rx },
        )
    }

    /// The jack that delivers into this device on `port`.
    pub fn jack(&self, port: usize) -> Jack {
        Jack {
            inbox: self.inbox.clone(),
            port,
        }
    }

    pub fn plug(&mut self, port: usize, jack: Jack) {
        self.cables.insert(port, jack);
    }

    /// Connects two ports together (bi-directional).
    pub fn connect(a: &mut PatchPanel, a_port: usize, b: &mut PatchPanel, b_port: usize) {
        let to_b = b.jack(b_port);
        let to_a = a.jack(a_port);
        a.plug(a_port, to_b);
        b.plug(b_port, to_a);
    }
}

impl Link for PatchPanel {
    fn send(&mut self, port: usize, bytes: Vec<u8>) {
        if let Some(jack) = self.cables.get(&port) {
            // The far device may already be gone; delivery is best effort.
            let _ = jack.inbox.send((jack.port, bytes));
        }
    }
}
