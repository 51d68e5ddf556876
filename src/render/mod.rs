pub(crate) mod background;
pub(crate) mod blur;
pub(crate) mod compositor;
pub(crate) mod cpu;
pub(crate) mod field;
pub(crate) mod trim;
