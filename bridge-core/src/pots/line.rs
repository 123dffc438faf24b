/// The three signals between the bridge and the subscriber-line circuit.
pub trait LineInterface {
    /// Raw switch-hook level; `true` while the handset is lifted.
    fn hook_is_off(&mut self) -> bool;

    /// Puts the line into (or out of) ring mode.
    fn set_ring_mode(&mut self, enabled: bool);

    /// Forward polarity when `true`, reversed tip/ring when `false`.
    fn set_forward(&mut self, forward: bool);
}

impl<T: LineInterface + ?Sized> LineInterface for &mut T {
    fn hook_is_off(&mut self) -> bool {
        (**self).hook_is_off()
    }

    fn set_ring_mode(&mut self, enabled: bool) {
        (**self).set_ring_mode(enabled);
    }

    fn set_forward(&mut self, forward: bool) {
        (**self).set_forward(forward);
    }
}
